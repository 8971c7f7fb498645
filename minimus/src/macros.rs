// `ok!` is a less bloaty alternative to the try operator (`?`) for places
// where no error conversion is needed.

macro_rules! ok {
    ($expr:expr) => {
        match $expr {
            Ok(val) => val,
            Err(err) => return Err(err),
        }
    };
}

/// Hidden utility module for the [`context!`](crate::context!) macro.
#[doc(hidden)]
pub mod __context {
    use crate::value::{Value, ValueMap};

    #[inline(always)]
    pub fn make() -> ValueMap {
        ValueMap::default()
    }

    #[inline(always)]
    pub fn add(ctx: &mut ValueMap, key: &'static str, value: Value) {
        ctx.insert(key.into(), value);
    }

    #[inline(always)]
    pub fn build(ctx: ValueMap) -> Value {
        Value::from(ctx)
    }
}

/// Creates a template context from keys and values.
///
/// ```rust
/// # use minimus::context;
/// let ctx = context!{
///     name => "Peter",
///     location => "World",
/// };
/// ```
///
/// Alternatively if the variable name matches the key name it can
/// be omitted:
///
/// ```rust
/// # use minimus::context;
/// let name = "Peter";
/// let ctx = context!{ name };
/// ```
///
/// The return value is a [`Value`](crate::value::Value).  Values are
/// converted with [`Value::from_serialize`](crate::value::Value::from_serialize)
/// so everything that implements `Serialize` can be passed.  Callables made
/// with [`Value::from_function`](crate::value::Value::from_function) or
/// [`Value::from_lambda`](crate::value::Value::from_lambda) pass through
/// unchanged.
///
/// Nested objects can be created by using the macro recursively:
///
/// ```rust
/// # use minimus::context;
/// let ctx = context! {
///     nav => vec![
///         context!(href => "/", title => "Index"),
///         context!(href => "/downloads", title => "Downloads"),
///     ]
/// };
/// ```
#[macro_export]
macro_rules! context {
    () => {
        $crate::__context::build($crate::__context::make())
    };
    (
        $($key:ident $(=> $value:expr)?),* $(,)?
    ) => {{
        let mut ctx = $crate::__context::make();
        $(
            $crate::__context_pair!(ctx, $key $(=> $value)?);
        )*
        $crate::__context::build(ctx)
    }};
}

#[macro_export]
#[doc(hidden)]
macro_rules! __context_pair {
    ($ctx:ident, $key:ident) => {{
        $crate::__context_pair!($ctx, $key => $key);
    }};
    ($ctx:ident, $key:ident => $value:expr) => {
        $crate::__context::add(
            &mut $ctx,
            stringify!($key),
            $crate::value::Value::from_serialize(&$value),
        );
    };
}

#[cfg(test)]
mod tests {
    use crate::value::Value;

    use similar_asserts::assert_eq;

    #[test]
    fn test_context() {
        let var1 = 23;
        let ctx = context!(var1, var2 => 42);
        assert_eq!(ctx.get_attr("var1"), Some(Value::from(23)));
        assert_eq!(ctx.get_attr("var2"), Some(Value::from(42)));
    }

    #[test]
    fn test_empty_context() {
        let ctx = context!();
        assert_eq!(ctx.len(), Some(0));
    }
}
