//! The interpreter (C6): linear dispatch over a jump-resolved token
//! vector, maintaining a program counter, the loop stack, the variable
//! environment, the filter registry, and the output buffer.
//!
//! Not reentrant: a render consumes its own scratch state but never
//! mutates the token vector, so the same compiled template can be
//! rendered concurrently from independent `Environment`/`LoopStack`
//! instances (see SPEC_FULL.md §5).

use std::rc::Rc;

use tracing::trace;

use crate::env::Environment;
use crate::error::RenderError;
use crate::filters::FilterRegistry;
use crate::format::{html_escape, FormatSettings};
use crate::loop_stack::{LoopFrame, LoopStack};
use crate::token::{Kind, ParamType, Token, ESCAPE_RAW, INFO_BEGIN_LAYOUT, NONE};
use crate::value::Value;

/// Unresolved-variable hook: called with the dotted/bracketed path's head
/// and its remaining member segments when neither the loop stack nor the
/// environment can resolve it. Returning `None` yields `Empty`.
pub type OnGetValue<'a> = dyn Fn(&str, &[String]) -> Option<Value> + 'a;

#[derive(Copy, Clone, PartialEq, Eq)]
enum Region {
    Unknown,
    Layout,
    Page,
}

struct Interpreter<'a> {
    tokens: &'a [Token],
    env: &'a Environment,
    filters: &'a FilterRegistry,
    format: &'a FormatSettings,
    on_get_value: Option<&'a OnGetValue<'a>>,
    loop_stack: LoopStack,
    region: Region,
    output: String,
}

pub fn render(
    tokens: &[Token],
    env: &Environment,
    filters: &FilterRegistry,
    format: &FormatSettings,
    on_get_value: Option<&OnGetValue<'_>>,
) -> Result<String, RenderError> {
    let _span = tracing::info_span!("render").entered();
    let mut interp = Interpreter {
        tokens,
        env,
        filters,
        format,
        on_get_value,
        loop_stack: LoopStack::new(),
        region: Region::Unknown,
        output: String::new(),
    };
    interp.run()
}

/// Split a dotted/bracketed variable path into segments: identifier runs
/// and `[N]` bracket runs, in the order they appear. `items[3].label`
/// becomes `["items", "[3]", "label"]`.
fn split_path(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = path.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '.' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                i += 1;
            }
            '[' => {
                if !current.is_empty() {
                    segments.push(std::mem::take(&mut current));
                }
                let mut bracket = String::from("[");
                i += 1;
                while i < chars.len() && chars[i] != ']' {
                    bracket.push(chars[i]);
                    i += 1;
                }
                bracket.push(']');
                i += 1;
                segments.push(bracket);
            }
            c => {
                current.push(c);
                i += 1;
            }
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

impl<'a> Interpreter<'a> {
    fn run(&mut self) -> Result<String, RenderError> {
        let mut pc = if matches!(self.tokens.first(), Some(t) if t.kind == Kind::SystemVersion) { 1 } else { 0 };

        while pc < self.tokens.len() {
            let token = &self.tokens[pc];
            match token.kind {
                Kind::Content => {
                    self.output.push_str(&token.value1);
                    pc += 1;
                }
                Kind::LineBreak => {
                    self.output.push('\n');
                    pc += 1;
                }
                Kind::SystemVersion => pc += 1,
                Kind::Value => {
                    let value = self.resolve_value(&token.value1);
                    let (value, next_pc) = self.apply_filters(pc, value)?;
                    self.emit(&value, token.ref2);
                    pc = next_pc;
                }
                Kind::LiteralString => {
                    let value = Value::string(token.value1.clone());
                    let (value, next_pc) = self.apply_filters(pc, value)?;
                    self.emit(&value, token.ref2);
                    pc = next_pc;
                }
                Kind::IfThen => {
                    let bool_idx = pc + 1;
                    let bool_tok = &self.tokens[bool_idx];
                    let negate = bool_tok.value1.starts_with('!');
                    let path = if negate { &bool_tok.value1[1..] } else { &bool_tok.value1[..] };
                    let value = self.resolve_value(path);
                    let (value, next_pc) = self.apply_filters(bool_idx, value)?;
                    let mut truthy = value.is_truthy();
                    if negate {
                        truthy = !truthy;
                    }
                    if truthy {
                        pc = next_pc;
                    } else if token.ref1 != NONE {
                        pc = token.ref1 as usize + 1;
                    } else {
                        pc = token.ref2 as usize + 1;
                    }
                }
                Kind::BoolExpression => pc += 1,
                Kind::Else => pc = token.ref2 as usize,
                Kind::EndIf => pc += 1,
                Kind::For => {
                    let value = self.resolve_value(&token.value1);
                    let items = materialize_items(&value);
                    if items.is_empty() {
                        pc = token.ref1 as usize + 1;
                    } else {
                        let mut frame =
                            LoopFrame::new(token.value1.clone(), token.value1.clone(), token.value2.clone(), items);
                        frame.advance();
                        trace!(source = %token.value1, iterator = %token.value2, "loop frame pushed");
                        self.loop_stack.push(frame);
                        pc += 1;
                    }
                }
                Kind::EndFor => {
                    let for_idx = token.ref1 as usize;
                    let still_in_range = self.loop_stack.top_mut().expect("EndFor without active frame").advance();
                    if still_in_range {
                        pc = for_idx + 1;
                    } else {
                        self.loop_stack.pop();
                        trace!("loop frame popped");
                        pc += 1;
                    }
                }
                Kind::Continue => pc = token.ref1 as usize,
                Kind::Block => {
                    if self.region == Region::Layout && token.ref1 != NONE {
                        self.loop_stack.push(LoopFrame::block_override(token.ref2 as usize));
                        pc = token.ref1 as usize + 1;
                    } else if self.region == Region::Page {
                        pc = token.ref2 as usize + 1;
                    } else {
                        pc += 1;
                    }
                }
                Kind::EndBlock => {
                    if matches!(self.loop_stack.top(), Some(f) if f.block_return.is_some()) {
                        let frame = self.loop_stack.pop().unwrap();
                        pc = frame.block_return.unwrap();
                    } else {
                        pc += 1;
                    }
                }
                Kind::Info => {
                    self.region = if token.value1 == INFO_BEGIN_LAYOUT { Region::Layout } else { Region::Page };
                    pc += 1;
                }
                Kind::Exit => break,
                Kind::Eof => break,
                Kind::FilterName | Kind::FilterParameter => {
                    // Only ever reached if a prior Value/LiteralString/BoolExpression
                    // failed to consume its filter chain; treat as a no-op skip.
                    pc += 1;
                }
            }
        }
        Ok(std::mem::take(&mut self.output))
    }

    fn emit(&mut self, value: &Value, escape: i64) {
        let text = self.format.format_value(value);
        if escape == ESCAPE_RAW {
            self.output.push_str(&text);
        } else {
            self.output.push_str(&html_escape(&text));
        }
    }

    /// If the token at `pc + 1` is a `FilterName`, apply its filter chain
    /// to `value` and return the new value plus the index just past the
    /// last consumed `FilterParameter`. Otherwise return `(value, pc + 1)`.
    fn apply_filters(&mut self, pc: usize, mut value: Value) -> Result<(Value, usize), RenderError> {
        let filter_idx = pc + 1;
        if !matches!(self.tokens.get(filter_idx), Some(t) if t.kind == Kind::FilterName) {
            return Ok((value, filter_idx));
        }
        let filter_tok = &self.tokens[filter_idx];
        let name = filter_tok.value1.clone();
        let param_count = filter_tok.ref1.max(0) as usize;
        let mut params = Vec::with_capacity(param_count);
        for i in 0..param_count {
            let param_tok = &self.tokens[filter_idx + 1 + i];
            let ty = ParamType::from_code(param_tok.ref2).unwrap_or(ParamType::String);
            let param_value = match ty {
                ParamType::Int => Value::Integer(param_tok.value1.parse().unwrap_or(0)),
                ParamType::Float => Value::Float(param_tok.value1.parse().unwrap_or(0.0)),
                ParamType::String => Value::string(param_tok.value1.clone()),
                ParamType::Variable => self.resolve_value(&param_tok.value1),
            };
            params.push(param_value);
        }
        value = self.filters.call(&name, &value, &params, self.format)?;
        Ok((value, filter_idx + 1 + param_count))
    }

    fn resolve_value(&self, path: &str) -> Value {
        let segments = split_path(path);
        let Some(head) = segments.first() else {
            return Value::Empty;
        };

        if head.eq_ignore_ascii_case("@@index") {
            return self.loop_stack.nearest_loop().map(|f| Value::Integer(f.index())).unwrap_or(Value::Empty);
        }
        if head.eq_ignore_ascii_case("@@odd") {
            return self.loop_stack.nearest_loop().map(|f| Value::Boolean(f.is_odd())).unwrap_or(Value::Empty);
        }
        if head.eq_ignore_ascii_case("@@even") {
            return self.loop_stack.nearest_loop().map(|f| Value::Boolean(f.is_even())).unwrap_or(Value::Empty);
        }

        if let Some(frame) = self.loop_stack.find_by_iterator(head) {
            let mut current = current_loop_value(frame);
            for seg in &segments[1..] {
                match current.get_member(seg) {
                    Some(v) => current = v,
                    None => return self.unresolved(head, &segments[1..]),
                }
            }
            return current;
        }

        if let Some(value) = self.env.get(head) {
            let mut current = value.clone();
            for seg in &segments[1..] {
                match current.get_member(seg) {
                    Some(v) => current = v,
                    None => return self.unresolved(head, &segments[1..]),
                }
            }
            return current;
        }

        self.unresolved(head, &segments[1..])
    }

    fn unresolved(&self, head: &str, members: &[String]) -> Value {
        self.on_get_value.and_then(|cb| cb(head, members)).unwrap_or(Value::Empty)
    }
}

/// The current element of a loop frame. For a `RowSource`, the shared
/// cursor is seeked to the frame's position first — every element in
/// such a frame's cached `items` points at the same underlying table.
fn current_loop_value(frame: &LoopFrame) -> Value {
    match frame.current() {
        Some(Value::RowSource(rows)) => {
            rows.seek(frame.position.max(0) as usize);
            Value::RowSource(Rc::clone(rows))
        }
        Some(other) => other.clone(),
        None => Value::Empty,
    }
}

fn materialize_items(value: &Value) -> Vec<Value> {
    match value {
        Value::WrappedList(list) => (0..list.count()).filter_map(|i| list.item(i)).collect(),
        Value::RowSource(rows) => (0..rows.len()).map(|_| Value::RowSource(Rc::clone(rows))).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{ESCAPE_HTML, NONE};

    fn settings() -> FormatSettings {
        FormatSettings::default()
    }

    #[test]
    fn content_and_value_render_with_escaping() {
        let tokens =
            vec![Token::content("Hello, "), Token::value("name", NONE, ESCAPE_HTML), Token::content("!"), Token::eof()];
        let mut env = Environment::new();
        env.set("name", Value::string("World"));
        let out = render(&tokens, &env, &FilterRegistry::default(), &settings(), None).unwrap();
        assert_eq!(out, "Hello, World!");
    }

    #[test]
    fn raw_flag_skips_html_escaping() {
        let tokens = vec![Token::value("raw", NONE, ESCAPE_RAW), Token::eof()];
        let mut env = Environment::new();
        env.set("raw", Value::string("<b>x</b>"));
        let out = render(&tokens, &env, &FilterRegistry::default(), &settings(), None).unwrap();
        assert_eq!(out, "<b>x</b>");
    }

    #[test]
    fn html_default_escapes_value() {
        let tokens = vec![Token::value("raw", NONE, ESCAPE_HTML), Token::eof()];
        let mut env = Environment::new();
        env.set("raw", Value::string("<b>x</b>"));
        let out = render(&tokens, &env, &FilterRegistry::default(), &settings(), None).unwrap();
        assert_eq!(out, "&lt;b&gt;x&lt;/b&gt;");
    }

    #[test]
    fn if_else_takes_false_branch() {
        let mut tokens = vec![
            Token::if_then(),
            Token::bool_expression("ok", NONE),
            Token::content("Y"),
            Token::els(),
            Token::content("N"),
            Token::end_if(),
            Token::eof(),
        ];
        crate::resolver::resolve(&mut tokens).unwrap();
        let mut env = Environment::new();
        env.set("ok", Value::Boolean(false));
        let out = render(&tokens, &env, &FilterRegistry::default(), &settings(), None).unwrap();
        assert_eq!(out, "N");
    }

    #[test]
    fn if_without_else_false_skips_to_endif() {
        let mut tokens =
            vec![Token::if_then(), Token::bool_expression("ok", NONE), Token::content("Y"), Token::end_if(), Token::eof()];
        crate::resolver::resolve(&mut tokens).unwrap();
        let mut env = Environment::new();
        env.set("ok", Value::Boolean(false));
        let out = render(&tokens, &env, &FilterRegistry::default(), &settings(), None).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn for_loop_iterates_wrapped_list() {
        struct Strs(Vec<&'static str>);
        impl crate::value::WrappedList for Strs {
            fn count(&self) -> usize {
                self.0.len()
            }
            fn item(&self, index: usize) -> Option<Value> {
                self.0.get(index).map(|s| Value::string(*s))
            }
        }
        let mut tokens =
            vec![Token::for_loop("items", "i"), Token::value("i", NONE, ESCAPE_HTML), Token::content(","), Token::end_for(), Token::eof()];
        crate::resolver::resolve(&mut tokens).unwrap();
        let mut env = Environment::new();
        env.set("items", Value::WrappedList(Rc::new(Strs(vec!["a", "b", "c"]))));
        let out = render(&tokens, &env, &FilterRegistry::default(), &settings(), None).unwrap();
        assert_eq!(out, "a,b,c,");
    }

    #[test]
    fn pseudo_index_is_one_based() {
        struct Strs(Vec<&'static str>);
        impl crate::value::WrappedList for Strs {
            fn count(&self) -> usize {
                self.0.len()
            }
            fn item(&self, index: usize) -> Option<Value> {
                self.0.get(index).map(|s| Value::string(*s))
            }
        }
        let mut tokens = vec![
            Token::for_loop("xs", "i"),
            Token::value("@@index", NONE, ESCAPE_HTML),
            Token::content(":"),
            Token::value("i", NONE, ESCAPE_HTML),
            Token::content(" "),
            Token::end_for(),
            Token::eof(),
        ];
        crate::resolver::resolve(&mut tokens).unwrap();
        let mut env = Environment::new();
        env.set("xs", Value::WrappedList(Rc::new(Strs(vec!["a", "b"]))));
        let out = render(&tokens, &env, &FilterRegistry::default(), &settings(), None).unwrap();
        assert_eq!(out, "1:a 2:b ");
    }

    #[test]
    fn unresolved_variable_falls_back_to_callback() {
        let tokens = vec![Token::value("missing", NONE, ESCAPE_HTML), Token::eof()];
        let env = Environment::new();
        let cb = |head: &str, _members: &[String]| (head == "missing").then(|| Value::string("fallback"));
        let out = render(&tokens, &env, &FilterRegistry::default(), &settings(), Some(&cb)).unwrap();
        assert_eq!(out, "fallback");
    }

    #[test]
    fn exit_stops_dispatch_early() {
        let tokens = vec![Token::content("before"), Token::exit(), Token::content("after"), Token::eof()];
        let env = Environment::new();
        let out = render(&tokens, &env, &FilterRegistry::default(), &settings(), None).unwrap();
        assert_eq!(out, "before");
    }

    #[test]
    fn layout_block_override_renders_child_content_only() {
        let mut tokens = vec![
            Token::info(INFO_BEGIN_LAYOUT),
            Token::content("["),
            Token::block("t"),
            Token::content("PARENT"),
            Token::end_block(),
            Token::content("]"),
            Token::info(crate::token::INFO_END_LAYOUT),
            Token::block("t"),
            Token::content("CHILD"),
            Token::end_block(),
            Token::eof(),
        ];
        crate::resolver::resolve(&mut tokens).unwrap();
        let env = Environment::new();
        let out = render(&tokens, &env, &FilterRegistry::default(), &settings(), None).unwrap();
        assert_eq!(out, "[CHILD]");
    }
}
