//! The token model (C1): the fixed-shape record the lexer emits and the
//! interpreter consumes. Every cross-reference between tokens (loop bounds,
//! if/else/endif links, block overrides) is a plain index into the token
//! vector, resolved in a second pass by [`crate::resolver`].

/// Sentinel value used in `ref1`/`ref2` fields to mean "unused" or
/// "not yet resolved".
pub const NONE: i64 = -1;

/// Parameter-type tag carried by `FilterParameter.ref2`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamType {
    Int,
    Float,
    String,
    Variable,
}

impl ParamType {
    pub fn as_code(self) -> i64 {
        match self {
            ParamType::Int => 0,
            ParamType::Float => 1,
            ParamType::String => 2,
            ParamType::Variable => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<ParamType> {
        match code {
            0 => Some(ParamType::Int),
            1 => Some(ParamType::Float),
            2 => Some(ParamType::String),
            3 => Some(ParamType::Variable),
            _ => None,
        }
    }
}

/// The tag half of a token. Field meaning per kind is documented on
/// [`Token`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Kind {
    Content = 0,
    For = 1,
    EndFor = 2,
    IfThen = 3,
    BoolExpression = 4,
    Else = 5,
    EndIf = 6,
    Continue = 7,
    Block = 8,
    EndBlock = 9,
    LiteralString = 10,
    Value = 11,
    FilterName = 12,
    FilterParameter = 13,
    LineBreak = 14,
    SystemVersion = 15,
    Exit = 16,
    Eof = 17,
    Info = 18,
}

impl Kind {
    pub fn from_byte(b: u8) -> Option<Kind> {
        use Kind::*;
        Some(match b {
            0 => Content,
            1 => For,
            2 => EndFor,
            3 => IfThen,
            4 => BoolExpression,
            5 => Else,
            6 => EndIf,
            7 => Continue,
            8 => Block,
            9 => EndBlock,
            10 => LiteralString,
            11 => Value,
            12 => FilterName,
            13 => FilterParameter,
            14 => LineBreak,
            15 => SystemVersion,
            16 => Exit,
            17 => Eof,
            18 => Info,
            _ => return None,
        })
    }
}

/// One entry in the compiled token vector.
///
/// `value1`/`value2` are the string payloads; `ref1`/`ref2` are resolved
/// indices into the same vector (or `NONE`). Meaning is per-`kind` — see
/// the table in SPEC_FULL.md §3.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub kind: Kind,
    pub value1: String,
    pub value2: String,
    pub ref1: i64,
    pub ref2: i64,
}

impl Token {
    pub fn new(kind: Kind) -> Token {
        Token { kind, value1: String::new(), value2: String::new(), ref1: NONE, ref2: NONE }
    }

    pub fn content(text: impl Into<String>) -> Token {
        Token { value1: text.into(), ..Token::new(Kind::Content) }
    }

    pub fn line_break() -> Token {
        Token::new(Kind::LineBreak)
    }

    pub fn system_version(version: impl Into<String>) -> Token {
        Token { value1: version.into(), ..Token::new(Kind::SystemVersion) }
    }

    pub fn eof() -> Token {
        Token::new(Kind::Eof)
    }

    pub fn exit() -> Token {
        Token::new(Kind::Exit)
    }

    pub fn info(marker: impl Into<String>) -> Token {
        Token { value1: marker.into(), ..Token::new(Kind::Info) }
    }

    pub fn value(path: impl Into<String>, filter_params: i64, escape: i64) -> Token {
        Token { value1: path.into(), ref1: filter_params, ref2: escape, ..Token::new(Kind::Value) }
    }

    pub fn literal_string(text: impl Into<String>, filter_params: i64, escape: i64) -> Token {
        Token {
            value1: text.into(),
            ref1: filter_params,
            ref2: escape,
            ..Token::new(Kind::LiteralString)
        }
    }

    pub fn filter_name(name: impl Into<String>, param_count: i64) -> Token {
        Token { value1: name.into(), ref1: param_count, ..Token::new(Kind::FilterName) }
    }

    pub fn filter_parameter(text: impl Into<String>, ty: ParamType) -> Token {
        Token {
            value1: text.into(),
            ref2: ty.as_code(),
            ..Token::new(Kind::FilterParameter)
        }
    }

    pub fn for_loop(iterable: impl Into<String>, iterator: impl Into<String>) -> Token {
        Token { value1: iterable.into(), value2: iterator.into(), ..Token::new(Kind::For) }
    }

    pub fn end_for() -> Token {
        Token::new(Kind::EndFor)
    }

    pub fn cont() -> Token {
        Token::new(Kind::Continue)
    }

    pub fn if_then() -> Token {
        Token::new(Kind::IfThen)
    }

    pub fn bool_expression(path: impl Into<String>, filter_params: i64) -> Token {
        Token {
            value1: path.into(),
            ref1: filter_params,
            ref2: NONE,
            ..Token::new(Kind::BoolExpression)
        }
    }

    pub fn els() -> Token {
        Token::new(Kind::Else)
    }

    pub fn end_if() -> Token {
        Token::new(Kind::EndIf)
    }

    pub fn block(name: impl Into<String>) -> Token {
        Token { value1: name.into(), ..Token::new(Kind::Block) }
    }

    pub fn end_block() -> Token {
        Token::new(Kind::EndBlock)
    }

    /// Whether the value escapes to HTML by default (the `$` suffix and
    /// `raw` filters flip this to false).
    pub fn is_raw(&self) -> bool {
        self.ref2 == 1
    }
}

pub const ESCAPE_HTML: i64 = -1;
pub const ESCAPE_RAW: i64 = 1;

pub const INFO_BEGIN_LAYOUT: &str = "begin_of_layout";
pub const INFO_END_LAYOUT: &str = "end_of_layout";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_type_round_trips_through_code() {
        for ty in [ParamType::Int, ParamType::Float, ParamType::String, ParamType::Variable] {
            assert_eq!(ParamType::from_code(ty.as_code()), Some(ty));
        }
    }

    #[test]
    fn value_token_defaults_to_html_escape() {
        let tok = Token::value("name", NONE, ESCAPE_HTML);
        assert!(!tok.is_raw());
    }

    #[test]
    fn raw_value_token_skips_escaping() {
        let tok = Token::value("name", NONE, ESCAPE_RAW);
        assert!(tok.is_raw());
    }
}
