//! Integration tests for Class programs that fail to parse. A parse failure
//! reports the line and column of the offending position and what the parser
//! was expecting there.

/// Parses the program, expecting a parse error with the given message.
macro_rules! assert_parse_error {
    ($src:expr, $expected_error:expr $(,)?) => {
        let error = class_lang::parse($src).unwrap_err();
        assert_eq!(error.to_string(), $expected_error);
    };
}

#[test]
fn test_empty_program() {
    assert_parse_error!(
        "",
        "Syntax error at 1:1: expected class declaration",
    );
    assert_parse_error!(
        "   \n  ",
        "Syntax error at 2:3: expected class declaration",
    );
}

#[test]
fn test_missing_initial_statement() {
    assert_parse_error!(
        "class C is begin constructor() is skip; end;",
        "Syntax error at 1:45: expected identifier",
    );
}

#[test]
fn test_missing_declaration_semicolon() {
    assert_parse_error!(
        "class C is begin constructor() is skip end; new C()",
        "Syntax error at 1:40: expected end of declaration",
    );
}

#[test]
fn test_trailing_garbage() {
    assert_parse_error!(
        "class C is begin constructor() is skip; end; new C() extra",
        "Syntax error at 1:54: expected end of program",
    );
}

#[test]
fn test_bad_assignment_value() {
    assert_parse_error!(
        "class C is begin constructor() is x := ; end; new C()",
        "Syntax error at 1:40: expected identifier",
    );
}

#[test]
fn test_error_location_and_excerpt() {
    let error = class_lang::parse(
        "class C is begin\n  constructor() is skip\nend;\nnew C()",
    )
    .unwrap_err();
    assert_eq!(
        error.to_string(),
        "Syntax error at 3:1: expected end of declaration"
    );
    assert_eq!(error.line(), 3);
    assert_eq!(error.column(), 1);
    assert_eq!(error.excerpt(), "end;");
    // The alternate form renders the offending line with a caret
    assert_eq!(
        format!("{:#}", error),
        "Syntax error at 3:1: expected end of declaration\n\
         >>> end;\n    ^"
    );
}
