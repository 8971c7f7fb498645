use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use minimus::value::Value;
use minimus::{context, Environment, Error, ErrorKind};

use similar_asserts::assert_eq;

#[test]
fn test_function_values() {
    let env = Environment::new();
    let view = context! {
        first => "John",
        last => "Doe",
        full => Value::from_function(|this: &Value| {
            Ok(format!(
                "{} {}",
                this.get_attr("first").unwrap_or_default(),
                this.get_attr("last").unwrap_or_default()
            ))
        }),
    };
    assert_eq!(env.render("{{full}}", &view, ()).unwrap(), "John Doe");
    assert_eq!(env.render("{{#full}}yes{{/full}}", &view, ()).unwrap(), "yes");
}

#[test]
fn test_function_receiver_is_current_scope() {
    let env = Environment::new();
    let view = context! {
        id => "root",
        items => vec![context!(id => "a"), context!(id => "b")],
        label => Value::from_function(|this: &Value| Ok(this.get_attr("id").unwrap_or_default())),
    };
    let rv = env
        .render("{{#items}}{{label}},{{/items}}{{label}}", view, ())
        .unwrap();
    assert_eq!(rv, "a,b,root");
}

#[test]
fn test_root_function_inside_list_section() {
    let env = Environment::new();
    let view = context! {
        people => vec![
            context!(first => "Ann", last => "Lee"),
            context!(first => "Bo", last => "Kim"),
        ],
        fullName => Value::from_function(|this: &Value| {
            Ok(format!(
                "{} {}",
                this.get_attr("first").unwrap_or_default(),
                this.get_attr("last").unwrap_or_default()
            ))
        }),
    };
    let rv = env
        .render("{{#people}}[{{fullName}}]{{/people}}", view, ())
        .unwrap();
    assert_eq!(rv, "[Ann Lee][Bo Kim]");
}

#[test]
fn test_dotted_function_receiver_is_owner() {
    let env = Environment::new();
    let view = context! {
        id => "root",
        items => vec![context!(id => "a")],
        person => context! {
            id => "person",
            label => Value::from_function(|this: &Value| Ok(this.get_attr("id").unwrap_or_default())),
        },
    };
    let rv = env
        .render("{{#items}}{{person.label}}{{/items}}", view, ())
        .unwrap();
    assert_eq!(rv, "person");
}

#[test]
fn test_function_returning_list_drives_section() {
    let env = Environment::new();
    let view = context! {
        numbers => Value::from_function(|_: &Value| Ok(vec![1, 2, 3])),
    };
    let rv = env.render("{{#numbers}}<{{.}}>{{/numbers}}", view, ()).unwrap();
    assert_eq!(rv, "<1><2><3>");
}

#[test]
fn test_function_error() {
    let env = Environment::new();
    let view = context! {
        broken => Value::from_function(|_: &Value| -> Result<Value, Error> {
            Err(Error::new(ErrorKind::CallbackError, "no value today"))
        }),
    };
    let err = env.render("a\nb {{broken}}", view, ()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CallbackError);
    assert_eq!(err.line(), Some(2));
    assert_eq!(
        err.to_string(),
        "callback failed: no value today (in <template>:2)"
    );
}

#[test]
fn test_lambda_renders_body() {
    let env = Environment::new();
    let view = context! {
        name => "World",
        bold => Value::from_lambda(|call| Ok(format!("<b>{}</b>", call.render(call.text())?))),
    };
    let rv = env
        .render("{{#bold}}Hi {{name}}.{{/bold}}", view, ())
        .unwrap();
    assert_eq!(rv, "<b>Hi World.</b>");
}

#[test]
fn test_lambda_gets_raw_body() {
    let env = Environment::new();
    let view = context! {
        raw => Value::from_lambda(|call| Ok(call.text().to_string())),
    };
    let rv = env.render("{{#raw}}\n  {{x}}\n{{/raw}}", view, ()).unwrap();
    assert_eq!(rv, "\n  {{x}}\n");
}

#[test]
fn test_lambda_scope_and_absent_result() {
    let env = Environment::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_inner = seen.clone();
    let view = context! {
        items => vec![context!(n => 1), context!(n => 2)],
        count => Value::from_lambda(move |call| {
            seen_inner.fetch_add(1, Ordering::Relaxed);
            assert!(call.scope().get_attr("n").is_some());
            Ok(())
        }),
    };
    let rv = env
        .render("{{#items}}{{#count}}ignored{{/count}}{{/items}}", view, ())
        .unwrap();
    assert_eq!(rv, "");
    assert_eq!(seen.load(Ordering::Relaxed), 2);
}

#[test]
fn test_lambda_output_is_not_escaped() {
    let env = Environment::new();
    let view = context! {
        tag => Value::from_lambda(|call| Ok(format!("<{}>", call.text()))),
    };
    assert_eq!(env.render("{{#tag}}em{{/tag}}", view, ()).unwrap(), "<em>");
}

#[test]
fn test_lambda_uses_section_delimiters() {
    let env = Environment::new();
    let view = context! {
        x => 1,
        twice => Value::from_lambda(|call| {
            let once = call.render(call.text())?;
            Ok(format!("{once}{once}"))
        }),
    };
    let rv = env
        .render("{{=<% %>=}}<%#twice%>[<%x%>]<%/twice%>", view, ())
        .unwrap();
    assert_eq!(rv, "[1][1]");
}

#[test]
fn test_lambda_render_sees_partials() {
    let env = Environment::new();
    let partials = BTreeMap::from([("p", "({{x}})")]);
    let view = context! {
        x => "y",
        wrap => Value::from_lambda(|call| call.render("{{> p}}")),
    };
    let rv = env.render("{{#wrap}}{{/wrap}}", view, &partials).unwrap();
    assert_eq!(rv, "(y)");
}

#[test]
fn test_inverted_section_ignores_lambda() {
    let env = Environment::new();
    let view = context! {
        l => Value::from_lambda(|_| Ok("called")),
    };
    assert_eq!(env.render("{{^l}}no{{/l}}", view, ()).unwrap(), "");
}

#[test]
fn test_lambda_render_error_is_wrapped() {
    let env = Environment::new();
    let view = context! {
        bad => Value::from_lambda(|call| call.render("{{#open}}")),
    };
    let err = env.render("first\n{{#bad}}{{/bad}}", view, ()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadPartial);
    assert_eq!(err.detail(), Some("could not render lambda body"));
    assert_eq!(err.line(), Some(2));
    let source = std::error::Error::source(&err)
        .and_then(|err| err.downcast_ref::<Error>())
        .unwrap();
    assert_eq!(source.kind(), ErrorKind::SyntaxError);
}
