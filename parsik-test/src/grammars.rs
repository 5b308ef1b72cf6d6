use parsik::{Grammar, Matcher};

pub fn phone() -> Grammar {
    Grammar::from_rules([(
        "PHONE",
        Matcher::sequence([
            Matcher::regex(r"\d{3}").unwrap(),
            Matcher::char('-').silent(),
            Matcher::regex(r"\d{4}").unwrap(),
        ]),
    )])
    .unwrap()
}

pub fn nested_lists() -> Grammar {
    Grammar::from_notation(
        r#"
        list  <- ~'[' items? ~']'
        items <- value (~',' value)*
        value <- list / re#[0-9]+#
        "#,
    )
    .unwrap()
}

/// The grammar of the calculator example, transforms included.
pub fn calculator() -> Grammar {
    parsik_example::grammar().unwrap()
}
