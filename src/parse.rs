//! The Class parser: source text in, AST out. Built the same way as the rest
//! of the crate's tree passes: a [Parse] trait with one impl per node, nom
//! combinators underneath, and `context` labels that become the `expected`
//! part of a [ParseError].
//!
//! Class is free-form: tokens are separated by arbitrary whitespace, so every
//! token parser skips leading whitespace itself.

use crate::{
    ast::{
        BoolExpr, ClassDecl, CtorDecl, Expr, MethodDecl, Program, Rhs, Stmt,
    },
    error::ParseError,
    util::{RawSpan, Span},
};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::multispace0,
    combinator::{cut, map, map_res, not, verify},
    error::{context, ErrorKind, VerboseError, VerboseErrorKind},
    multi::{many0, many1, separated_list0, separated_list1},
    sequence::{pair, preceded, terminated, tuple},
    IResult,
};

type ParseResult<'a, T> = IResult<RawSpan<'a>, T, VerboseError<RawSpan<'a>>>;

/// Words that can never be identifiers.
const RESERVED_WORDS: &[&str] = &[
    "begin",
    "class",
    "constructor",
    "do",
    "else",
    "end",
    "if",
    "is",
    "method",
    "new",
    "return",
    "skip",
    "then",
    "var",
    "while",
];

/// A trait for parsing into AST nodes. Any AST node that can be parsed from
/// the source should implement this trait.
trait Parse<'a>: Sized {
    /// Attempt to parse the input into the AST node. Consumes any leading
    /// whitespace, but no trailing whitespace.
    fn parse(input: RawSpan<'a>) -> ParseResult<'a, Self>;
}

// ===== Token parsers =====

/// Parse a punctuation token, consuming leading whitespace.
fn symbol<'a>(
    token: &'static str,
) -> impl FnMut(RawSpan<'a>) -> ParseResult<'a, RawSpan<'a>> {
    preceded(multispace0, tag(token))
}

/// Parse a keyword, consuming leading whitespace. The keyword must end at a
/// word boundary, so that e.g. `skipper` parses as an identifier rather than
/// the keyword `skip` followed by garbage.
fn keyword<'a>(
    word: &'static str,
) -> impl FnMut(RawSpan<'a>) -> ParseResult<'a, ()> {
    map(
        preceded(multispace0, terminated(tag(word), not(word_chars))),
        |_| (),
    )
}

fn word_chars(input: RawSpan<'_>) -> ParseResult<'_, RawSpan<'_>> {
    take_while1(|c: char| c.is_alphanumeric())(input)
}

/// Apply a parser behind leading whitespace, with its context label
/// positioned after that whitespace, so errors point at the offending token
/// rather than the gap before it. The inner token parsers all skip leading
/// whitespace themselves, so consuming it here first is harmless.
fn ws_context<'a, O, F>(
    label: &'static str,
    parser: F,
) -> impl FnMut(RawSpan<'a>) -> ParseResult<'a, O>
where
    F: FnMut(RawSpan<'a>) -> ParseResult<'a, O>,
{
    preceded(multispace0, context(label, parser))
}

/// Like [symbol], but labelled via [ws_context].
fn symbol_ctx<'a>(
    label: &'static str,
    token: &'static str,
) -> impl FnMut(RawSpan<'a>) -> ParseResult<'a, RawSpan<'a>> {
    ws_context(label, tag(token))
}

/// Succeed only at the end of the input.
fn end_of_file(input: RawSpan<'_>) -> ParseResult<'_, ()> {
    if input.fragment().is_empty() {
        Ok((input, ()))
    } else {
        Err(nom::Err::Error(VerboseError {
            errors: vec![(input, VerboseErrorKind::Nom(ErrorKind::Eof))],
        }))
    }
}

/// Parse an identifier: a letter followed by letters and digits, excluding
/// reserved words.
fn identifier(input: RawSpan<'_>) -> ParseResult<'_, String> {
    ws_context(
        "identifier",
        map_res(
            verify(word_chars, |s: &RawSpan<'_>| {
                s.fragment()
                    .chars()
                    .next()
                    .map_or(false, char::is_alphabetic)
            }),
            |s: RawSpan<'_>| {
                let fragment = *s.fragment();
                // Use an empty error for convenience, its value won't be
                // used anyway
                if RESERVED_WORDS.contains(&fragment) {
                    Err(())
                } else {
                    Ok(fragment.to_string())
                }
            },
        ),
    )(input)
}

/// Parse a parenthesised, comma-separated, possibly empty list of names.
/// Used for parameter lists and argument lists alike.
fn name_list(input: RawSpan<'_>) -> ParseResult<'_, Vec<String>> {
    preceded(
        symbol("("),
        cut(terminated(
            separated_list0(symbol(","), identifier),
            symbol(")"),
        )),
    )(input)
}

// ===== Node parsers =====

impl<'a> Parse<'a> for BoolExpr {
    fn parse(input: RawSpan<'a>) -> ParseResult<'a, Self> {
        ws_context(
            "boolean expression",
            map(
                tuple((
                    identifier,
                    alt((symbol("!="), symbol("="))),
                    cut(identifier),
                )),
                |(var1, operator, var2)| {
                    if *operator.fragment() == "=" {
                        Self::Eq(var1, var2)
                    } else {
                        Self::Neq(var1, var2)
                    }
                },
            ),
        )(input)
    }
}

impl<'a> Parse<'a> for Expr {
    fn parse(input: RawSpan<'a>) -> ParseResult<'a, Self> {
        alt((
            // `new C(a, b)`
            map(
                preceded(keyword("new"), cut(pair(identifier, name_list))),
                |(class, args)| Self::New { class, args },
            ),
            // `o.m(a, b)` - must come before the plain variable, which is a
            // prefix of it
            map(
                tuple((identifier, symbol("."), cut(identifier), name_list)),
                |(target, _, method, args)| Self::Call {
                    target,
                    method,
                    args,
                },
            ),
            // `x`
            map(identifier, Self::Var),
        ))(input)
    }
}

/// Parse a sequence: one or more statements separated by semicolons.
fn sequence(input: RawSpan<'_>) -> ParseResult<'_, Vec<Stmt>> {
    separated_list1(symbol(";"), Stmt::parse)(input)
}

/// A one-statement sequence is just that statement; anything longer becomes
/// a Sequence node.
fn seq_to_stmt(mut stmts: Vec<Stmt>) -> Stmt {
    if stmts.len() == 1 {
        stmts.pop().unwrap()
    } else {
        Stmt::Sequence(stmts)
    }
}

/// Parse the body of a scoped statement: `open seq close`.
fn scoped_body<'a>(
    open: &'static str,
    close: &'static str,
) -> impl FnMut(RawSpan<'a>) -> ParseResult<'a, Stmt> {
    map(
        preceded(symbol(open), cut(terminated(sequence, symbol(close)))),
        seq_to_stmt,
    )
}

/// Parse a `var x;` declaration, yielding the declared name.
fn var_decl(input: RawSpan<'_>) -> ParseResult<'_, String> {
    preceded(
        keyword("var"),
        cut(terminated(identifier, symbol(";"))),
    )(input)
}

/// Parse a `begin ... end` block with its local variable declarations.
fn block(input: RawSpan<'_>) -> ParseResult<'_, Stmt> {
    map(
        preceded(
            keyword("begin"),
            cut(terminated(
                pair(many0(var_decl), sequence),
                ws_context("end of block", keyword("end")),
            )),
        ),
        |(vars, body)| Stmt::Block { vars, body },
    )(input)
}

fn if_stmt(input: RawSpan<'_>) -> ParseResult<'_, Stmt> {
    map(
        preceded(
            keyword("if"),
            cut(tuple((
                BoolExpr::parse,
                preceded(keyword("then"), Stmt::parse),
                preceded(keyword("else"), Stmt::parse),
            ))),
        ),
        |(cond, then_stmt, else_stmt)| Stmt::If {
            cond,
            then_stmt: Box::new(then_stmt),
            else_stmt: Box::new(else_stmt),
        },
    )(input)
}

fn while_stmt(input: RawSpan<'_>) -> ParseResult<'_, Stmt> {
    map(
        preceded(
            keyword("while"),
            cut(pair(
                BoolExpr::parse,
                preceded(keyword("do"), Stmt::parse),
            )),
        ),
        |(cond, body)| Stmt::While {
            cond,
            body: Box::new(body),
        },
    )(input)
}

/// Parse an assignment `x := expr` or `x := [ ... ]`.
fn assign(input: RawSpan<'_>) -> ParseResult<'_, Stmt> {
    map(
        tuple((identifier, symbol(":="), cut(rhs))),
        |(target, _, rhs)| Stmt::Assign(target, rhs),
    )(input)
}

fn rhs(input: RawSpan<'_>) -> ParseResult<'_, Rhs> {
    ws_context(
        "assignment value",
        alt((
            map(scoped_body("[", "]"), |body| {
                Rhs::MethodScoped(Box::new(body))
            }),
            map(Expr::parse, Rhs::Expr),
        )),
    )(input)
}

impl<'a> Parse<'a> for Stmt {
    fn parse(input: RawSpan<'a>) -> ParseResult<'a, Self> {
        ws_context(
            "statement",
            alt((
                block,
                map(keyword("skip"), |_| Self::Skip),
                map(preceded(keyword("return"), cut(identifier)), Self::Return),
                if_stmt,
                while_stmt,
                map(scoped_body("{", "}"), |body| {
                    Self::BlockScoped(Box::new(body))
                }),
                map(scoped_body("[", "]"), |body| {
                    Self::MethodScoped(Box::new(body))
                }),
                // assignment must come before the expression statement, which
                // shares its identifier prefix; alt backtracks if there is no
                // `:=`
                assign,
                map(Expr::parse, Self::Expr),
            )),
        )(input)
    }
}

impl<'a> Parse<'a> for CtorDecl {
    fn parse(input: RawSpan<'a>) -> ParseResult<'a, Self> {
        ws_context(
            "constructor declaration",
            map(
                preceded(
                    keyword("constructor"),
                    cut(tuple((
                        name_list,
                        preceded(keyword("is"), Stmt::parse),
                        symbol_ctx("end of declaration", ";"),
                    ))),
                ),
                |(params, body, _)| Self { params, body },
            ),
        )(input)
    }
}

impl<'a> Parse<'a> for MethodDecl {
    fn parse(input: RawSpan<'a>) -> ParseResult<'a, Self> {
        map(
            preceded(
                keyword("method"),
                cut(tuple((
                    identifier,
                    name_list,
                    preceded(keyword("is"), Stmt::parse),
                    symbol_ctx("end of declaration", ";"),
                ))),
            ),
            |(name, params, body, _)| Self { name, params, body },
        )(input)
    }
}

impl<'a> Parse<'a> for ClassDecl {
    fn parse(input: RawSpan<'a>) -> ParseResult<'a, Self> {
        ws_context(
            "class declaration",
            map(
                preceded(
                    keyword("class"),
                    cut(tuple((
                        identifier,
                        keyword("is"),
                        keyword("begin"),
                        many0(var_decl),
                        CtorDecl::parse,
                        many0(MethodDecl::parse),
                        keyword("end"),
                        symbol_ctx("end of declaration", ";"),
                    ))),
                ),
                |(name, _, _, vars, ctor, methods, _, _)| Self {
                    name,
                    vars,
                    ctor,
                    methods,
                },
            ),
        )(input)
    }
}

impl<'a> Parse<'a> for Program {
    fn parse(input: RawSpan<'a>) -> ParseResult<'a, Self> {
        map(
            pair(many1(ClassDecl::parse), Stmt::parse),
            |(classes, initial)| Self { classes, initial },
        )(input)
    }
}

/// Parse a complete program. On failure, the reported position and `expected`
/// element come from the innermost labelled parser that gave up.
pub(crate) fn parse(input: &str) -> Result<Program, ParseError> {
    let result = terminated(
        Program::parse,
        preceded(multispace0, context("end of program", end_of_file)),
    )(RawSpan::new(input));
    match result {
        Ok((_, program)) => Ok(program),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            // Grab the first error in the chain that is a Context, which
            // means we labelled it ourselves. Everything else is generated by
            // nom, which means it's useless to a human.
            let (raw_span, expected) = e
                .errors
                .iter()
                .filter_map(|(span, kind)| match kind {
                    VerboseErrorKind::Context(label) => Some((span, *label)),
                    _ => None,
                })
                .next()
                // This indicates we're missing a context() call somewhere
                .expect("no context errors available");

            Err(ParseError::new(
                expected,
                Span::from_position(raw_span),
                input,
            ))
        }
        // only possible in streaming mode
        Err(nom::Err::Incomplete(_needed)) => unreachable!(),
    }
}
