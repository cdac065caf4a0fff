// uDashBoard: featherweight dashboard application.
//
// Copyright (C) 2019  Brandon Lewis
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

//! A token-stream text-template engine: a compiler (lexer + parser +
//! jump resolver) turns template source into a flat, linearly
//! addressable token vector, and an interpreter executes that vector
//! against a variable environment to produce output.
//!
//! ```
//! use skein::Template;
//!
//! let template = Template::compile("Hello, {{:name}}!", "greeting").unwrap();
//! template.set_data("name", skein::Value::string("World"));
//! assert_eq!(template.render().unwrap(), "Hello, World!");
//! ```

#[macro_use]
extern crate lazy_static;

pub mod dump;
pub mod env;
pub mod error;
pub mod filters;
pub mod format;
pub mod interpreter;
pub mod lexer;
pub mod loop_stack;
pub mod parser;
pub mod resolver;
pub mod token;
pub mod value;

use std::cell::RefCell;
use std::path::Path;

use tracing::instrument;

pub use env::Environment;
pub use error::{CompileError, DumpError, RenderError};
pub use filters::FilterRegistry;
pub use format::FormatSettings;
pub use interpreter::OnGetValue;
pub use parser::CompileOptions;
pub use token::Token;
pub use value::{Object, RowSource, Value, WrappedList};

/// A compiled template: a resolved token vector plus the mutable state a
/// render consumes (variable environment, filter registry, format
/// settings, unresolved-lookup callback). Not reentrant — build one
/// `Template` per thread that renders concurrently.
pub struct Template {
    tokens: Vec<Token>,
    env: RefCell<Environment>,
    filters: RefCell<FilterRegistry>,
    format: RefCell<FormatSettings>,
}

impl Template {
    /// Compile `source` and run jump resolution, producing a ready-to-render
    /// template. `ref_path` is used only to resolve relative `include`/
    /// `extends` paths; it need not exist on disk unless the template uses
    /// either directive.
    #[instrument(skip(source))]
    pub fn compile(source: &str, ref_path: impl AsRef<Path>) -> Result<Template, CompileError> {
        Self::compile_with_options(source, ref_path, CompileOptions::default())
    }

    pub fn compile_with_options(
        source: &str,
        ref_path: impl AsRef<Path>,
        options: CompileOptions,
    ) -> Result<Template, CompileError> {
        let mut tokens = {
            let _span = tracing::info_span!("compile").entered();
            parser::compile(source, ref_path.as_ref(), options)?
        };
        {
            let _span = tracing::info_span!("resolve_jumps").entered();
            resolver::resolve(&mut tokens)?;
        }
        Ok(Template {
            tokens,
            env: RefCell::new(Environment::new()),
            filters: RefCell::new(FilterRegistry::default()),
            format: RefCell::new(FormatSettings::default()),
        })
    }

    /// Bind a variable (case-insensitive name). Replaces any prior binding.
    pub fn set_data(&self, name: &str, value: Value) {
        self.env.borrow_mut().set(name, value);
    }

    /// Drop all variable bindings.
    pub fn clear_data(&self) {
        self.env.borrow_mut().clear();
    }

    /// Register a filter, replacing any existing filter of the same
    /// (case-insensitive) name.
    pub fn add_filter(
        &self,
        name: &str,
        f: impl Fn(&Value, &[Value], &FormatSettings) -> Result<Value, RenderError> + 'static,
    ) {
        self.filters.borrow_mut().register(name, f);
    }

    /// Replace the active format settings wholesale.
    pub fn set_format_settings(&self, settings: FormatSettings) {
        *self.format.borrow_mut() = settings;
    }

    pub fn format_settings(&self) -> FormatSettings {
        self.format.borrow().clone()
    }

    /// Render the template against the current environment and filter
    /// registry. `on_get_value` is consulted whenever a variable path
    /// can't be resolved through the loop stack or environment.
    #[instrument(skip(self, on_get_value))]
    pub fn render_with(&self, on_get_value: Option<&OnGetValue<'_>>) -> Result<String, RenderError> {
        let env = self.env.borrow();
        let filters = self.filters.borrow();
        let format = self.format.borrow();
        interpreter::render(&self.tokens, &env, &filters, &format, on_get_value)
    }

    pub fn render(&self) -> Result<String, RenderError> {
        self.render_with(None)
    }

    /// Walk the resolved token vector in order; debug/introspection only.
    pub fn for_each_token(&self, mut visitor: impl FnMut(usize, &Token)) {
        for (idx, token) in self.tokens.iter().enumerate() {
            visitor(idx, token);
        }
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), DumpError> {
        dump::save_to_file(&self.tokens, path)
    }

    pub fn create_from_file(path: impl AsRef<Path>) -> Result<Template, DumpError> {
        let tokens = dump::create_from_file(path)?;
        Ok(Template {
            tokens,
            env: RefCell::new(Environment::new()),
            filters: RefCell::new(FilterRegistry::default()),
            format: RefCell::new(FormatSettings::default()),
        })
    }

    pub fn dump_to_file(&self, path: impl AsRef<Path>) -> Result<(), DumpError> {
        dump::dump_to_file(&self.tokens, path)
    }
}
