//! The jump resolver (C4): a single linear pass over the token vector
//! that rewrites `ref1`/`ref2` on control-flow tokens into resolved
//! indices, and wires layout blocks to their page overrides.
//!
//! Token positions aren't carried past the parser, so resolver-raised
//! structural errors (unbalanced `if`/`for`, stray `endfor`) report line
//! 0 against this synthetic file label rather than the exact source
//! line; precise positions remain available for syntax errors raised
//! during parsing itself.
use std::collections::HashMap;

use crate::error::CompileError;
use crate::token::{Kind, Token, INFO_BEGIN_LAYOUT, NONE};

const NO_POSITION: &str = "<resolved>";

#[derive(Copy, Clone, PartialEq, Eq)]
enum LayoutState {
    Unknown,
    Layout,
    Page,
}

/// Rewrite every control-flow `ref1`/`ref2` in `tokens` in place.
pub fn resolve(tokens: &mut [Token]) -> Result<(), CompileError> {
    let mut for_stack: Vec<usize> = Vec::new();
    let mut continue_stack: Vec<usize> = Vec::new();
    let mut if_stack: Vec<(usize, Option<usize>)> = Vec::new();
    let mut layout_blocks: HashMap<String, usize> = HashMap::new();
    let mut state = LayoutState::Unknown;
    let mut current_block: Option<usize> = None;
    let mut saw_exit = false;

    for idx in 0..tokens.len() {
        match tokens[idx].kind {
            Kind::Info => {
                state = if tokens[idx].value1 == INFO_BEGIN_LAYOUT { LayoutState::Layout } else { LayoutState::Page };
            }
            Kind::For => {
                if !continue_stack.is_empty() {
                    return Err(CompileError::Internal("continue stack corrupted at 'for'".into()));
                }
                for_stack.push(idx);
            }
            Kind::EndFor => {
                let for_idx = for_stack.pop().ok_or_else(|| CompileError::EndForWithoutFor {
                    line: 0,
                    file: NO_POSITION.into(),
                })?;
                tokens[for_idx].ref1 = idx as i64;
                tokens[idx].ref1 = for_idx as i64;
                for cont_idx in continue_stack.drain(..) {
                    tokens[cont_idx].ref1 = idx as i64;
                }
            }
            Kind::Continue => {
                if for_stack.is_empty() {
                    return Err(CompileError::ContinueOutsideFor { line: 0, file: NO_POSITION.into() });
                }
                continue_stack.push(idx);
            }
            Kind::IfThen => if_stack.push((idx, None)),
            Kind::Else => {
                let (if_idx, _) = if_stack.pop().ok_or_else(|| CompileError::EndIfWithoutIf {
                    line: 0,
                    file: NO_POSITION.into(),
                })?;
                if_stack.push((if_idx, Some(idx)));
            }
            Kind::EndIf => {
                let (if_idx, else_idx) = if_stack.pop().ok_or_else(|| CompileError::EndIfWithoutIf {
                    line: 0,
                    file: NO_POSITION.into(),
                })?;
                tokens[if_idx].ref1 = else_idx.map(|i| i as i64).unwrap_or(NONE);
                tokens[if_idx].ref2 = idx as i64;
                if let Some(else_idx) = else_idx {
                    tokens[else_idx].ref2 = idx as i64;
                }
            }
            Kind::Exit => saw_exit = true,
            Kind::Block => {
                if current_block.is_some() {
                    return Err(CompileError::NestedBlock { line: 0, file: NO_POSITION.into() });
                }
                current_block = Some(idx);
                match state {
                    LayoutState::Layout => {
                        let name = tokens[idx].value1.clone();
                        if layout_blocks.contains_key(&name) {
                            return Err(CompileError::DuplicateBlock { name, file: NO_POSITION.into() });
                        }
                        layout_blocks.insert(name, idx);
                    }
                    LayoutState::Page => {
                        if let Some(&layout_idx) = layout_blocks.get(&tokens[idx].value1) {
                            tokens[layout_idx].ref1 = idx as i64;
                        }
                    }
                    LayoutState::Unknown => {}
                }
            }
            Kind::EndBlock => {
                if let Some(block_idx) = current_block.take() {
                    // Layout blocks use ref2 as the jump-table link back from
                    // an overriding page block's EndBlock; page blocks reuse
                    // it at render time to skip their own body when reached
                    // by ordinary sequential flow instead of an override jump.
                    tokens[block_idx].ref2 = idx as i64;
                }
            }
            _ => {}
        }
    }

    if !saw_exit {
        if let Some(for_idx) = for_stack.first() {
            let _ = for_idx;
            return Err(CompileError::UnbalancedFor { line: 0, file: NO_POSITION.into() });
        }
        if let Some((if_idx, _)) = if_stack.first() {
            let _ = if_idx;
            return Err(CompileError::UnbalancedIf { line: 0, file: NO_POSITION.into() });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    #[test]
    fn for_and_endfor_cross_link() {
        let mut tokens = vec![Token::for_loop("items", "i"), Token::end_for(), Token::eof()];
        resolve(&mut tokens).unwrap();
        assert_eq!(tokens[0].ref1, 1);
        assert_eq!(tokens[1].ref1, 0);
    }

    #[test]
    fn continue_inside_for_points_at_endfor() {
        let mut tokens = vec![Token::for_loop("items", "i"), Token::cont(), Token::end_for(), Token::eof()];
        resolve(&mut tokens).unwrap();
        assert_eq!(tokens[1].ref1, 2);
    }

    #[test]
    fn if_else_endif_cross_link() {
        let mut tokens = vec![
            Token::if_then(),
            Token::bool_expression("ok", NONE),
            Token::els(),
            Token::end_if(),
            Token::eof(),
        ];
        resolve(&mut tokens).unwrap();
        assert_eq!(tokens[0].ref1, 2);
        assert_eq!(tokens[0].ref2, 3);
        assert_eq!(tokens[2].ref2, 3);
    }

    #[test]
    fn if_without_else_has_ref1_none() {
        let mut tokens = vec![Token::if_then(), Token::bool_expression("ok", NONE), Token::end_if(), Token::eof()];
        resolve(&mut tokens).unwrap();
        assert_eq!(tokens[0].ref1, NONE);
        assert_eq!(tokens[0].ref2, 2);
    }

    #[test]
    fn unbalanced_for_is_an_error() {
        let mut tokens = vec![Token::for_loop("items", "i"), Token::eof()];
        assert!(matches!(resolve(&mut tokens), Err(CompileError::UnbalancedFor { .. })));
    }

    #[test]
    fn stray_endfor_is_an_error() {
        let mut tokens = vec![Token::end_for(), Token::eof()];
        assert!(matches!(resolve(&mut tokens), Err(CompileError::EndForWithoutFor { .. })));
    }

    #[test]
    fn exit_suppresses_unbalanced_checks() {
        let mut tokens = vec![Token::if_then(), Token::bool_expression("ok", NONE), Token::exit(), Token::eof()];
        assert!(resolve(&mut tokens).is_ok());
    }

    #[test]
    fn layout_block_linked_to_page_override() {
        let mut tokens = vec![
            Token::info(crate::token::INFO_BEGIN_LAYOUT),
            Token::block("t"),
            Token::content("PARENT"),
            Token::end_block(),
            Token::info(crate::token::INFO_END_LAYOUT),
            Token::block("t"),
            Token::content("CHILD"),
            Token::end_block(),
            Token::eof(),
        ];
        resolve(&mut tokens).unwrap();
        assert_eq!(tokens[1].ref1, 5);
        assert_eq!(tokens[1].ref2, 3);
    }
}
