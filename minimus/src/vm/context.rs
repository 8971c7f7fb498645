use std::fmt;

use crate::error::Error;
use crate::value::Value;

/// The context stack.
///
/// The bottom frame is the view passed to render.  Sections push lists
/// items and maps as they are entered.
pub struct Context {
    stack: Vec<Value>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.stack.iter().rev()).finish()
    }
}

impl Context {
    /// Creates a context with the given root frame.
    pub fn new(root: Value) -> Context {
        let mut stack = Vec::with_capacity(8);
        stack.push(root);
        Context { stack }
    }

    /// Pushes a new frame.
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pops the topmost frame.
    ///
    /// The root frame is never removed.
    pub fn pop(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    /// Returns the topmost frame.
    pub fn top(&self) -> &Value {
        match self.stack.last() {
            Some(value) => value,
            None => &Value::UNDEFINED,
        }
    }

    /// Looks up a dotted path.
    ///
    /// `.` is the topmost frame.  Otherwise the frames are searched from the
    /// top.  Within a frame all segments but the last are traversed, a
    /// missing or absent segment moves the search on to the next frame.
    /// The first frame where the last segment is present wins, even if the
    /// value stored there is none.
    ///
    /// Functions are invoked with the innermost scope reached by the lookup
    /// and their return value is used.  For a dotted path that is the object
    /// the last segment was found on, for a plain name it is the topmost
    /// frame, even if the function itself was found further down.  A path
    /// that cannot be found resolves to undefined.
    pub fn lookup(&self, path: &str) -> Result<Value, Error> {
        if path == "." {
            return Ok(self.top().clone());
        }

        let (parents, target) = match path.rsplit_once('.') {
            Some((parents, target)) => (Some(parents), target),
            None => (None, path),
        };

        'frames: for frame in self.stack.iter().rev() {
            let mut receiver = frame.clone();
            if let Some(parents) = parents {
                for segment in parents.split('.') {
                    match receiver.get_attr(segment) {
                        Some(value) if !value.is_absent() => receiver = value,
                        _ => continue 'frames,
                    }
                }
            }
            if let Some(value) = receiver.get_attr(target) {
                return match value.as_function() {
                    Some(f) if parents.is_some() => f(&receiver),
                    Some(f) => f(self.top()),
                    None => Ok(value),
                };
            }
        }

        Ok(Value::UNDEFINED)
    }
}
