//! The parser (C3): single-pass scan of verbatim text and `{{ ... }}`
//! directives into a flat token vector, with recursive descent into
//! `include`/`extends` sub-templates. Jump resolution (C4, in
//! [`crate::resolver`]) runs once, after every nested template has been
//! spliced into the final vector.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::CompileError;
use crate::lexer::Cursor;
use crate::token::{ParamType, Token, INFO_BEGIN_LAYOUT, INFO_END_LAYOUT, NONE};

/// Current engine version, carried as the leading `SystemVersion`
/// token's payload.
pub const SYSTEM_VERSION: &str = "1.0";

#[derive(Copy, Clone, Debug, Default)]
pub struct CompileOptions {
    pub ignore_sys_version: bool,
    pub parent_template: bool,
}

enum Counts {
    Yes,
    No,
}

struct Parser<'a> {
    cursor: Cursor,
    tokens: Vec<Token>,
    content_on_line: usize,
    verbatim: String,
    ref_path: &'a Path,
    options: CompileOptions,
    saw_extends: bool,
}

/// Compile `source` (referenced from `ref_path`, used only to resolve
/// relative `include`/`extends` paths) into a token vector. Does not run
/// jump resolution — call [`crate::resolver::resolve`] on the result.
pub fn compile(source: &str, ref_path: &Path, options: CompileOptions) -> Result<Vec<Token>, CompileError> {
    let file = ref_path.to_string_lossy().to_string();
    let mut parser = Parser {
        cursor: Cursor::new(source, &file),
        tokens: Vec::new(),
        content_on_line: 0,
        verbatim: String::new(),
        ref_path,
        options,
        saw_extends: false,
    };
    parser.run()
}

impl<'a> Parser<'a> {
    fn run(&mut self) -> Result<Vec<Token>, CompileError> {
        if !self.options.ignore_sys_version {
            self.tokens.push(Token::system_version(SYSTEM_VERSION));
        }

        while !self.cursor.eof() {
            if self.cursor.starts_with("{{{") {
                self.cursor.bump();
                self.cursor.bump();
                self.cursor.bump();
                self.verbatim.push('{');
                self.verbatim.push('{');
            } else if self.cursor.starts_with("{{") {
                self.flush_verbatim();
                self.cursor.bump();
                self.cursor.bump();
                if self.parse_directive()? {
                    self.content_on_line += 1;
                }
            } else if self.cursor.at_newline() {
                self.flush_verbatim();
                if self.content_on_line > 0 {
                    self.tokens.push(Token::line_break());
                }
                self.content_on_line = 0;
                self.cursor.bump_newline();
            } else {
                self.verbatim.push(self.cursor.bump().unwrap());
            }
        }
        self.flush_verbatim();
        self.tokens.push(Token::eof());
        Ok(std::mem::take(&mut self.tokens))
    }

    fn flush_verbatim(&mut self) {
        if !self.verbatim.is_empty() {
            self.tokens.push(Token::content(std::mem::take(&mut self.verbatim)));
            self.content_on_line += 1;
        }
    }

    /// Parse the body of a `{{ ... }}` directive (cursor positioned just
    /// after the opening braces) and push its tokens. Returns whether
    /// this directive counts toward the "content on this line" tally.
    fn parse_directive(&mut self) -> Result<bool, CompileError> {
        self.cursor.skip_ws();
        let counts = match self.cursor.peek() {
            Some('#') => {
                self.parse_comment()?;
                return Ok(false);
            }
            Some(':') => {
                self.parse_value()?;
                Counts::Yes
            }
            Some('"') => {
                self.parse_literal_string()?;
                Counts::Yes
            }
            _ => {
                let keyword = self.cursor.read_ident()?.to_ascii_lowercase();
                match keyword.as_str() {
                    "for" => {
                        self.parse_for()?;
                        Counts::No
                    }
                    "endfor" => {
                        self.tokens.push(Token::end_for());
                        Counts::No
                    }
                    "continue" => {
                        self.tokens.push(Token::cont());
                        Counts::No
                    }
                    "if" => {
                        self.parse_if()?;
                        Counts::No
                    }
                    "else" => {
                        self.tokens.push(Token::els());
                        Counts::No
                    }
                    "endif" => {
                        self.tokens.push(Token::end_if());
                        Counts::No
                    }
                    "block" => {
                        self.parse_block()?;
                        Counts::No
                    }
                    "endblock" => {
                        self.tokens.push(Token::end_block());
                        Counts::No
                    }
                    "exit" => {
                        self.tokens.push(Token::exit());
                        Counts::No
                    }
                    "include" => {
                        self.parse_include()?;
                        Counts::Yes
                    }
                    "extends" => {
                        self.parse_extends()?;
                        Counts::Yes
                    }
                    other => return Err(self.cursor.err(format!("unknown directive {other:?}"))),
                }
            }
        };
        self.cursor.skip_ws();
        if !self.cursor.starts_with("}}") {
            return Err(self.cursor.err("expected '}}' to close directive"));
        }
        self.cursor.bump();
        self.cursor.bump();
        Ok(matches!(counts, Counts::Yes))
    }

    fn parse_comment(&mut self) -> Result<(), CompileError> {
        loop {
            if self.cursor.starts_with("}}") {
                self.cursor.bump();
                self.cursor.bump();
                return Ok(());
            }
            if self.cursor.eof() {
                return Err(self.cursor.err("unterminated comment"));
            }
            self.cursor.bump();
        }
    }

    fn parse_escape_flag(&mut self) -> i64 {
        if self.cursor.peek() == Some('$') {
            self.cursor.bump();
            crate::token::ESCAPE_RAW
        } else {
            crate::token::ESCAPE_HTML
        }
    }

    /// Parses an optional `'|' name (',' param)*` filter chain and
    /// pushes the `FilterName`/`FilterParameter` tokens. Returns the
    /// parameter count, or `NONE` if no filter was present.
    fn parse_optional_filter(&mut self) -> Result<i64, CompileError> {
        self.cursor.skip_ws();
        if self.cursor.peek() != Some('|') {
            return Ok(NONE);
        }
        self.cursor.bump();
        self.cursor.skip_ws();
        let name = self.cursor.read_ident()?;
        let mut params = Vec::new();
        loop {
            self.cursor.skip_ws();
            if self.cursor.peek() == Some(',') {
                self.cursor.bump();
                self.cursor.skip_ws();
                params.push(self.parse_filter_param()?);
            } else {
                break;
            }
        }
        let count = params.len() as i64;
        self.tokens.push(Token::filter_name(name, count));
        for (text, ty) in params {
            self.tokens.push(Token::filter_parameter(text, ty));
        }
        Ok(count)
    }

    fn parse_filter_param(&mut self) -> Result<(String, ParamType), CompileError> {
        match self.cursor.peek() {
            Some('"') => Ok((self.cursor.read_quoted_string()?, ParamType::String)),
            Some(c) if c == '+' || c == '-' || c.is_ascii_digit() => {
                let (text, is_float) = self.cursor.read_number()?;
                Ok((text, if is_float { ParamType::Float } else { ParamType::Int }))
            }
            Some(_) => Ok((self.cursor.read_var_path()?, ParamType::Variable)),
            None => Err(self.cursor.err("expected filter parameter")),
        }
    }

    fn parse_value(&mut self) -> Result<(), CompileError> {
        self.cursor.bump(); // ':'
        let path = self.cursor.read_var_path()?;
        let escape = self.parse_escape_flag();
        let before = self.tokens.len();
        let param_count = self.parse_optional_filter()?;
        let value_token = Token::value(path, param_count, escape);
        self.tokens.insert(before, value_token);
        Ok(())
    }

    fn parse_literal_string(&mut self) -> Result<(), CompileError> {
        let text = self.cursor.read_quoted_string()?;
        let escape = self.parse_escape_flag();
        let before = self.tokens.len();
        let param_count = self.parse_optional_filter()?;
        let lit_token = Token::literal_string(text, param_count, escape);
        self.tokens.insert(before, lit_token);
        Ok(())
    }

    fn parse_for(&mut self) -> Result<(), CompileError> {
        self.cursor.skip_ws();
        let iterator_name = self.cursor.read_ident()?;
        self.cursor.skip_ws();
        let kw = self.cursor.read_ident()?;
        if !kw.eq_ignore_ascii_case("in") {
            return Err(self.cursor.err("expected 'in' in 'for' statement"));
        }
        self.cursor.skip_ws();
        let iterable_path = self.cursor.read_var_path()?;
        let head = iterable_path.split('.').next().unwrap_or(&iterable_path);
        if head.eq_ignore_ascii_case(&iterator_name) {
            return Err(CompileError::IteratorShadowsSource {
                name: iterator_name,
                line: self.cursor.line(),
                file: self.ref_path.to_string_lossy().to_string(),
            });
        }
        self.tokens.push(Token::for_loop(iterable_path, iterator_name));
        Ok(())
    }

    fn parse_if(&mut self) -> Result<(), CompileError> {
        self.cursor.skip_ws();
        let mut path = String::new();
        if self.cursor.peek() == Some('!') {
            self.cursor.bump();
            path.push('!');
        }
        path.push_str(&self.cursor.read_var_path()?);
        let before = self.tokens.len();
        let param_count = self.parse_optional_filter()?;
        let bool_token = Token::bool_expression(path, param_count);
        self.tokens.insert(before, bool_token);
        self.tokens.insert(before, Token::if_then());
        Ok(())
    }

    fn parse_block(&mut self) -> Result<(), CompileError> {
        self.cursor.skip_ws();
        let name = self.cursor.read_quoted_string()?;
        self.tokens.push(Token::block(name));
        Ok(())
    }

    fn resolve_path(&self, requested: &str) -> PathBuf {
        let base_dir: &Path = if self.ref_path.is_dir() {
            self.ref_path
        } else {
            self.ref_path.parent().unwrap_or_else(|| Path::new("."))
        };
        base_dir.join(requested)
    }

    fn compile_sub_template(&self, requested: &str) -> Result<Vec<Token>, CompileError> {
        let path = self.resolve_path(requested);
        let source = fs::read_to_string(&path).map_err(|source| CompileError::UnresolvedInclude {
            path: path.to_string_lossy().to_string(),
            referrer: self.ref_path.to_string_lossy().to_string(),
            source,
        })?;
        let sub_options = CompileOptions { ignore_sys_version: true, parent_template: true };
        let mut tokens = compile(&source, &path, sub_options)?;
        if matches!(tokens.last(), Some(t) if t.kind == crate::token::Kind::Eof) {
            tokens.pop();
        }
        Ok(tokens)
    }

    fn parse_include(&mut self) -> Result<(), CompileError> {
        self.cursor.skip_ws();
        let path_str = self.cursor.read_quoted_string()?;
        let spliced = self.compile_sub_template(&path_str)?;
        self.tokens.extend(spliced);
        Ok(())
    }

    fn parse_extends(&mut self) -> Result<(), CompileError> {
        if self.saw_extends {
            return Err(CompileError::DuplicateExtends { file: self.ref_path.to_string_lossy().to_string() });
        }
        if self.options.parent_template {
            return Err(CompileError::ExtendsInParentTemplate {
                file: self.ref_path.to_string_lossy().to_string(),
            });
        }
        self.saw_extends = true;
        self.cursor.skip_ws();
        let path_str = self.cursor.read_quoted_string()?;
        let spliced = self.compile_sub_template(&path_str)?;
        self.tokens.push(Token::info(INFO_BEGIN_LAYOUT));
        self.tokens.extend(spliced);
        self.tokens.push(Token::info(INFO_END_LAYOUT));
        Ok(())
    }
}
