//! Parser for declarative scripts
//!
//! Produces a [`Block`] from source text. The grammar is the Kotlin-script
//! subset the declarative language allows:
//!
//! ```text
//! script      := (import end)* (statement end)*
//! statement   := "val" ident "=" expr | expr "=" expr | expr
//! expr        := primary ("." ident call-suffix?)*
//! primary     := string | int | long | "true" | "false" | "null" | "this"
//!              | ident call-suffix? | "(" expr ")"
//! call-suffix := "(" args? ")" lambda? | lambda
//! lambda      := "{" (statement end)* "}"
//! end         := ";" | newline | before "}" | end of input
//! ```
//!
//! Failures are batched: a broken top-level statement is recorded and the
//! parser resumes at the next newline or `;` outside brackets, so one pass
//! reports every broken statement in the script.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, digit1, line_ending, multispace1, satisfy, space1},
    combinator::{cut, eof, map, not, opt, peek, recognize, value},
    error::{context, VerboseError, VerboseErrorKind},
    multi::{many0_count, separated_list0, separated_list1},
    sequence::{pair, preceded, terminated, tuple},
    IResult, Slice,
};
use nom_locate::LocatedSpan;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::*;

pub type Input<'a> = LocatedSpan<&'a str>;
type PResult<'a, O> = IResult<Input<'a>, O, VerboseError<Input<'a>>>;

/// Words that can never be used as names
const KEYWORDS: &[&str] = &[
    "as", "class", "do", "else", "false", "for", "fun", "if", "import", "in", "interface", "is",
    "null", "object", "package", "return", "this", "throw", "true", "try", "typealias", "val",
    "var", "when", "while",
];

// ============================================================================
// Public API
// ============================================================================

/// One broken statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralFailure {
    pub message: String,
    pub line: u32,
    pub column: u32,
    pub offset: usize,
    /// Source text at the failure position, or `end of input`
    pub found: String,
}

impl StructuralFailure {
    fn at(position: Input<'_>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: position.location_line(),
            column: position.get_utf8_column() as u32,
            offset: position.location_offset(),
            found: found_text(position),
        }
    }

    fn from_error(statement_start: Input<'_>, error: &VerboseError<Input<'_>>) -> Self {
        let context = error.errors.iter().find_map(|(position, kind)| match kind {
            VerboseErrorKind::Context(message) => Some((*position, *message)),
            _ => None,
        });

        match context {
            Some((position, message)) => Self::at(position, message),
            None => {
                let position = error
                    .errors
                    .first()
                    .map(|(position, _)| *position)
                    .unwrap_or(statement_start);
                Self::at(position, "unexpected input")
            }
        }
    }
}

impl std::fmt::Display for StructuralFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {} (found {})",
            self.line, self.column, self.message, self.found
        )
    }
}

/// Every structural failure found in one script
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{label}: {}", render_failures(.failures))]
pub struct ParseFailures {
    pub label: String,
    pub failures: Vec<StructuralFailure>,
}

fn render_failures(failures: &[StructuralFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parse a complete script.
///
/// `context_label` names the script in failure reports (usually its path).
pub fn parse_script(source: &str, context_label: &str) -> Result<Block, ParseFailures> {
    let start = Input::new(source);
    let mut input = start;
    let mut statements = Vec::new();
    let mut failures = Vec::new();
    let mut body_started = false;

    loop {
        match separators(input) {
            Ok((rest, _)) => input = rest,
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                failures.push(StructuralFailure::from_error(input, &e));
                input = input.slice(input.fragment().len()..);
                break;
            }
            Err(nom::Err::Incomplete(_)) => break,
        }

        if input.fragment().is_empty() {
            break;
        }

        match top_level_statement(input) {
            Ok((rest, statement)) => {
                match &statement {
                    Statement::Import(_) if body_started => failures.push(StructuralFailure::at(
                        input,
                        "imports must precede all other statements",
                    )),
                    Statement::Import(_) => {}
                    _ => body_started = true,
                }
                statements.push(statement);
                input = rest;
            }
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                failures.push(StructuralFailure::from_error(input, &e));
                body_started = true;
                input = recover(input);
            }
            Err(nom::Err::Incomplete(_)) => {
                failures.push(StructuralFailure::at(input, "incomplete input"));
                break;
            }
        }
    }

    if failures.is_empty() {
        Ok(Block {
            statements,
            span: span_between(start, input),
        })
    } else {
        tracing::debug!(
            label = context_label,
            count = failures.len(),
            "script has structural failures"
        );
        Err(ParseFailures {
            label: context_label.to_string(),
            failures,
        })
    }
}

/// Parse a single standalone expression (no statements, no imports)
pub fn parse_expression(source: &str) -> Result<Expr, ParseFailures> {
    let input = Input::new(source);
    let parsed = tuple((
        trivia,
        expression,
        trivia,
        context("unexpected input after expression", eof),
    ))(input);

    match parsed {
        Ok((_, (_, expr, _, _))) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ParseFailures {
            label: "<expression>".to_string(),
            failures: vec![StructuralFailure::from_error(input, &e)],
        }),
        Err(nom::Err::Incomplete(_)) => Err(ParseFailures {
            label: "<expression>".to_string(),
            failures: vec![StructuralFailure::at(input, "incomplete input")],
        }),
    }
}

// ============================================================================
// Positions
// ============================================================================

fn span_between(start: Input<'_>, end: Input<'_>) -> Span {
    Span::new(
        start.location_offset(),
        end.location_offset(),
        start.location_line(),
        start.get_utf8_column() as u32,
    )
}

fn found_text(position: Input<'_>) -> String {
    let line = position.fragment().lines().next().unwrap_or("").trim_end();
    if line.is_empty() {
        return "end of input".to_string();
    }
    let mut found: String = line.chars().take(24).collect();
    if line.chars().count() > 24 {
        found.push_str("...");
    }
    format!("'{}'", found)
}

fn failure<'a, O>(position: Input<'a>, message: &'static str) -> PResult<'a, O> {
    Err(nom::Err::Failure(VerboseError {
        errors: vec![(position, VerboseErrorKind::Context(message))],
    }))
}

/// Skip past the broken statement starting at `input`: up to and including
/// the next newline or `;` that is not nested in brackets or a string.
fn recover(input: Input<'_>) -> Input<'_> {
    let text = *input.fragment();
    let mut open_brackets: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (index, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' || c == '\n' {
                in_string = false;
            }
            if c != '\n' {
                continue;
            }
        }

        match c {
            '"' => in_string = true,
            '(' | '{' => open_brackets.push(c),
            ')' | '}' => {
                // an unbalanced closer also closes whatever it skipped over
                let opener = if c == ')' { '(' } else { '{' };
                if let Some(position) = open_brackets.iter().rposition(|&o| o == opener) {
                    open_brackets.truncate(position);
                }
            }
            '\n' | ';' if open_brackets.is_empty() => return input.slice(index + 1..),
            _ => {}
        }
    }

    input.slice(text.len()..)
}

// ============================================================================
// Trivia
// ============================================================================

fn line_comment(input: Input<'_>) -> PResult<'_, Input<'_>> {
    recognize(pair(tag("//"), take_while(|c: char| c != '\n' && c != '\r')))(input)
}

fn block_comment(input: Input<'_>) -> PResult<'_, Input<'_>> {
    recognize(preceded(
        tag("/*"),
        cut(context(
            "unterminated block comment",
            pair(take_until("*/"), tag("*/")),
        )),
    ))(input)
}

/// Whitespace (including newlines) and comments
fn trivia(input: Input<'_>) -> PResult<'_, ()> {
    value((), many0_count(alt((multispace1, line_comment, block_comment))))(input)
}

/// Spaces, tabs and comments, stopping at a newline
fn inline_trivia(input: Input<'_>) -> PResult<'_, ()> {
    value((), many0_count(alt((space1, line_comment, block_comment))))(input)
}

/// Trivia plus empty statements between statements
fn separators(input: Input<'_>) -> PResult<'_, ()> {
    value(
        (),
        many0_count(alt((
            multispace1,
            line_comment,
            block_comment,
            recognize(char(';')),
        ))),
    )(input)
}

fn statement_end(input: Input<'_>) -> PResult<'_, ()> {
    preceded(
        inline_trivia,
        context(
            "expected end of statement",
            alt((
                value((), char(';')),
                value((), line_ending),
                value((), peek(char('}'))),
                value((), eof),
            )),
        ),
    )(input)
}

// ============================================================================
// Names
// ============================================================================

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn raw_identifier(input: Input<'_>) -> PResult<'_, Input<'_>> {
    recognize(pair(
        satisfy(|c| c.is_alphabetic() || c == '_'),
        take_while(is_identifier_char),
    ))(input)
}

fn identifier(input: Input<'_>) -> PResult<'_, String> {
    let (rest, name) = raw_identifier(input)?;
    if KEYWORDS.contains(name.fragment()) {
        return Err(nom::Err::Error(VerboseError {
            errors: vec![(input, VerboseErrorKind::Nom(nom::error::ErrorKind::Verify))],
        }));
    }
    Ok((rest, name.fragment().to_string()))
}

fn keyword<'a>(word: &'static str) -> impl FnMut(Input<'a>) -> PResult<'a, Input<'a>> {
    move |input| terminated(tag(word), not(satisfy(is_identifier_char)))(input)
}

// ============================================================================
// Statements
// ============================================================================

fn top_level_statement(input: Input<'_>) -> PResult<'_, Statement> {
    terminated(alt((map(import, Statement::Import), statement)), statement_end)(input)
}

fn import(input: Input<'_>) -> PResult<'_, Import> {
    let start = input;
    let (rest, _) = keyword("import")(input)?;
    let (rest, _) = inline_trivia(rest)?;
    let (rest, parts) = cut(context(
        "expected qualified name after 'import'",
        separated_list1(char('.'), identifier),
    ))(rest)?;

    Ok((
        rest,
        Import {
            name: AccessChain { parts },
            span: span_between(start, rest),
        },
    ))
}

fn statement(input: Input<'_>) -> PResult<'_, Statement> {
    alt((local_value, var_declaration, expression_or_assignment))(input)
}

fn local_value(input: Input<'_>) -> PResult<'_, Statement> {
    let start = input;
    let (rest, _) = keyword("val")(input)?;
    let (rest, _) = inline_trivia(rest)?;
    let (rest, name) = cut(context("expected name after 'val'", identifier))(rest)?;
    let (rest, _) = inline_trivia(rest)?;
    let (rest, _) = cut(context("expected '=' after local name", char('=')))(rest)?;
    let (rest, _) = trivia(rest)?;
    let (rest, rhs) = cut(expression)(rest)?;

    Ok((
        rest,
        Statement::LocalValue(LocalValue {
            name,
            rhs,
            span: span_between(start, rest),
        }),
    ))
}

fn var_declaration(input: Input<'_>) -> PResult<'_, Statement> {
    let (_, _) = keyword("var")(input)?;
    failure(input, "'var' is not supported, use 'val'")
}

fn assignment_operator(input: Input<'_>) -> PResult<'_, char> {
    preceded(inline_trivia, terminated(char('='), not(char('='))))(input)
}

fn expression_or_assignment(input: Input<'_>) -> PResult<'_, Statement> {
    let start = input;
    let (rest, lhs) = expression(input)?;
    let (after_operator, operator) = opt(assignment_operator)(rest)?;

    if operator.is_none() {
        return Ok((rest, Statement::Expr(lhs)));
    }

    let lhs = match lhs {
        Expr::PropertyAccess(access) => access,
        _ => return failure(start, "only properties can be assigned"),
    };

    let (rest, _) = trivia(after_operator)?;
    let (rest, rhs) = cut(expression)(rest)?;

    Ok((
        rest,
        Statement::Assignment(Assignment {
            lhs,
            rhs,
            span: span_between(start, rest),
        }),
    ))
}

// ============================================================================
// Expressions
// ============================================================================

fn expression(input: Input<'_>) -> PResult<'_, Expr> {
    let start = input;
    let (mut rest, mut expr) = context("expected expression", primary)(input)?;

    loop {
        let dot: PResult<'_, char> = preceded(trivia, char('.'))(rest);
        let after_dot = match dot {
            Ok((after, _)) => after,
            Err(nom::Err::Error(_)) => break,
            Err(e) => return Err(e),
        };

        let (after, _) = trivia(after_dot)?;
        let (after, name) = cut(context("expected name after '.'", identifier))(after)?;
        let (after, args) = opt(call_suffix)(after)?;
        let span = span_between(start, after);
        let receiver = Some(Box::new(expr));

        expr = match args {
            Some(args) => Expr::FunctionCall(FunctionCall {
                receiver,
                name,
                args,
                span,
            }),
            None => Expr::PropertyAccess(PropertyAccess {
                receiver,
                name,
                span,
            }),
        };
        rest = after;
    }

    Ok((rest, expr))
}

fn primary(input: Input<'_>) -> PResult<'_, Expr> {
    alt((
        map(string_literal, Expr::Literal),
        map(number_literal, Expr::Literal),
        boolean_literal,
        null_literal,
        this_reference,
        parenthesized,
        name_or_call,
    ))(input)
}

fn parenthesized(input: Input<'_>) -> PResult<'_, Expr> {
    let (rest, _) = char('(')(input)?;
    let (rest, _) = trivia(rest)?;
    let (rest, expr) = cut(expression)(rest)?;
    let (rest, _) = trivia(rest)?;
    let (rest, _) = cut(context("expected ')'", char(')')))(rest)?;
    Ok((rest, expr))
}

fn name_or_call(input: Input<'_>) -> PResult<'_, Expr> {
    let start = input;
    let (rest, name) = identifier(input)?;
    let (rest, args) = opt(call_suffix)(rest)?;
    let span = span_between(start, rest);

    Ok((
        rest,
        match args {
            Some(args) => Expr::FunctionCall(FunctionCall {
                receiver: None,
                name,
                args,
                span,
            }),
            None => Expr::PropertyAccess(PropertyAccess {
                receiver: None,
                name,
                span,
            }),
        },
    ))
}

/// `(args) { lambda }`, `(args)` or `{ lambda }` after a name
fn call_suffix(input: Input<'_>) -> PResult<'_, Vec<FunctionArgument>> {
    let (input, _) = inline_trivia(input)?;
    alt((
        map(
            pair(value_arguments, opt(preceded(inline_trivia, lambda_argument))),
            |(mut args, lambda)| {
                args.extend(lambda);
                args
            },
        ),
        map(lambda_argument, |lambda| vec![lambda]),
    ))(input)
}

fn value_arguments(input: Input<'_>) -> PResult<'_, Vec<FunctionArgument>> {
    let (rest, _) = char('(')(input)?;
    let (rest, args) = separated_list0(preceded(trivia, char(',')), preceded(trivia, argument))(rest)?;
    let (rest, _) = opt(preceded(trivia, char(',')))(rest)?;
    let (rest, _) = trivia(rest)?;
    let (rest, _) = cut(context("expected ')' to close argument list", char(')')))(rest)?;
    Ok((rest, args))
}

fn argument(input: Input<'_>) -> PResult<'_, FunctionArgument> {
    alt((named_argument, positional_argument))(input)
}

fn named_argument(input: Input<'_>) -> PResult<'_, FunctionArgument> {
    let start = input;
    let (rest, name) = identifier(input)?;
    let (rest, _) = preceded(trivia, terminated(char('='), not(char('='))))(rest)?;
    let (rest, _) = trivia(rest)?;
    let (rest, expr) = cut(expression)(rest)?;

    Ok((
        rest,
        FunctionArgument::Named {
            name,
            expr,
            span: span_between(start, rest),
        },
    ))
}

fn positional_argument(input: Input<'_>) -> PResult<'_, FunctionArgument> {
    let start = input;
    let (rest, expr) = expression(input)?;
    Ok((
        rest,
        FunctionArgument::Positional {
            expr,
            span: span_between(start, rest),
        },
    ))
}

fn lambda_argument(input: Input<'_>) -> PResult<'_, FunctionArgument> {
    let start = input;
    let (rest, block) = braced_block(input)?;
    Ok((
        rest,
        FunctionArgument::Lambda {
            block,
            span: span_between(start, rest),
        },
    ))
}

fn braced_block(input: Input<'_>) -> PResult<'_, Block> {
    let start = input;
    let (rest, _) = char('{')(input)?;
    let (rest, statements) = cut(block_body)(rest)?;

    Ok((
        rest,
        Block {
            statements,
            span: span_between(start, rest),
        },
    ))
}

/// Statements up to and including the closing `}`
fn block_body(input: Input<'_>) -> PResult<'_, Vec<Statement>> {
    let mut statements = Vec::new();
    let (mut rest, _) = separators(input)?;

    loop {
        if let Ok((after, _)) = char::<_, VerboseError<Input<'_>>>('}')(rest) {
            return Ok((after, statements));
        }
        if rest.fragment().is_empty() {
            return failure(rest, "expected '}' to close block");
        }

        let (after, statement) = terminated(statement, statement_end)(rest)?;
        let (after, _) = separators(after)?;
        statements.push(statement);
        rest = after;
    }
}

// ============================================================================
// Literals
// ============================================================================

fn boolean_literal(input: Input<'_>) -> PResult<'_, Expr> {
    let start = input;
    let (rest, value) = alt((
        value(true, keyword("true")),
        value(false, keyword("false")),
    ))(input)?;

    Ok((
        rest,
        Expr::Literal(Literal::Boolean {
            value,
            span: span_between(start, rest),
        }),
    ))
}

fn null_literal(input: Input<'_>) -> PResult<'_, Expr> {
    let (rest, _) = keyword("null")(input)?;
    Ok((rest, Expr::Null(span_between(input, rest))))
}

fn this_reference(input: Input<'_>) -> PResult<'_, Expr> {
    let (rest, _) = keyword("this")(input)?;
    Ok((rest, Expr::This(span_between(input, rest))))
}

/// Decimal integers: `Int` when the value fits 32 bits, otherwise `Long`;
/// an `L` suffix always makes a `Long`.
fn number_literal(input: Input<'_>) -> PResult<'_, Literal> {
    let start = input;
    let (rest, digits) = recognize(pair(opt(char('-')), digit1))(input)?;
    let (rest, long_suffix) = opt(char('L'))(rest)?;
    let (rest, _) = not(satisfy(is_identifier_char))(rest)?;
    let span = span_between(start, rest);
    let text = *digits.fragment();

    let literal = if long_suffix.is_some() {
        text.parse::<i64>()
            .ok()
            .map(|value| Literal::Long { value, span })
    } else if let Ok(value) = text.parse::<i32>() {
        Some(Literal::Int { value, span })
    } else {
        text.parse::<i64>()
            .ok()
            .map(|value| Literal::Long { value, span })
    };

    match literal {
        Some(literal) => Ok((rest, literal)),
        None => failure(start, "integer literal out of range"),
    }
}

fn string_literal(input: Input<'_>) -> PResult<'_, Literal> {
    let start = input;
    let (mut rest, _) = char('"')(input)?;
    let mut value = String::new();

    loop {
        let mut chars = rest.fragment().chars();
        match chars.next() {
            None | Some('\n') | Some('\r') => {
                return failure(start, "unterminated string literal")
            }
            Some('"') => {
                rest = rest.slice(1..);
                break;
            }
            Some('\\') => {
                let escaped = match chars.next() {
                    Some('n') => '\n',
                    Some('t') => '\t',
                    Some('r') => '\r',
                    Some('\\') => '\\',
                    Some('"') => '"',
                    Some('\'') => '\'',
                    Some('$') => '$',
                    _ => return failure(rest, "invalid escape sequence"),
                };
                value.push(escaped);
                rest = rest.slice(2..);
            }
            Some('$')
                if matches!(chars.next(), Some(c) if c == '{' || c.is_alphabetic() || c == '_') =>
            {
                return failure(rest, "string templates are not supported");
            }
            Some(c) => {
                value.push(c);
                rest = rest.slice(c.len_utf8()..);
            }
        }
    }

    Ok((
        rest,
        Literal::String {
            value,
            span: span_between(start, rest),
        },
    ))
}

// ============================================================================
// Tests
// ============================================================================
