//! End-to-end scenarios (S1-S8) and the universal invariants, exercised
//! through the public `Template` API the way a caller would use it,
//! rather than through any module-internal function.

use skein::token::{Kind, NONE};
use skein::{CompileError, Template, Value};

#[test]
fn s1_simple_substitution() {
    let t = Template::compile("Hello, {{:name}}!", "s1").unwrap();
    t.set_data("name", Value::string("World"));
    assert_eq!(t.render().unwrap(), "Hello, World!");
}

#[test]
fn s2_raw_suffix_skips_escaping() {
    let t = Template::compile("{{:raw$}}", "s2").unwrap();
    t.set_data("raw", Value::string("<b>x</b>"));
    assert_eq!(t.render().unwrap(), "<b>x</b>");
}

#[test]
fn s3_default_value_escapes_html() {
    let t = Template::compile("{{:raw}}", "s3").unwrap();
    t.set_data("raw", Value::string("<b>x</b>"));
    assert_eq!(t.render().unwrap(), "&lt;b&gt;x&lt;/b&gt;");
}

#[test]
fn s4_for_loop_over_a_wrapped_list() {
    let t = Template::compile("{{for i in items}}{{:i}},{{endfor}}", "s4").unwrap();
    t.set_data("items", string_list(&["a", "b", "c"]));
    assert_eq!(t.render().unwrap(), "a,b,c,");
}

#[test]
fn s5_if_else_false_branch() {
    let t = Template::compile("{{if ok}}Y{{else}}N{{endif}}", "s5").unwrap();
    t.set_data("ok", Value::Boolean(false));
    assert_eq!(t.render().unwrap(), "N");
}

#[test]
fn s6_pseudo_index_is_one_based() {
    let t = Template::compile("{{for i in xs}}{{:@@index}}:{{:i}} {{endfor}}", "s6").unwrap();
    t.set_data("xs", string_list(&["a", "b"]));
    assert_eq!(t.render().unwrap(), "1:a 2:b ");
}

#[test]
fn s7_layout_block_override_via_extends() {
    let dir = std::env::temp_dir().join("skein-e2e-s7");
    std::fs::create_dir_all(&dir).unwrap();
    let parent_path = dir.join("parent.tmpl");
    std::fs::write(&parent_path, r#"[{{block "t"}}PARENT{{endblock}}]"#).unwrap();

    let child_source = r#"{{extends "parent.tmpl"}}{{block "t"}}CHILD{{endblock}}"#;
    let t = Template::compile(child_source, &parent_path).unwrap();
    assert_eq!(t.render().unwrap(), "[CHILD]");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn s8_gt_filter_drives_an_if_branch() {
    let t = Template::compile(r#"{{if n|gt,3}}big{{else}}small{{endif}}"#, "s8").unwrap();
    t.set_data("n", Value::Integer(5));
    assert_eq!(t.render().unwrap(), "big");
}

// --- Universal invariants (SPEC_FULL.md §8) ---

#[test]
fn invariant_for_endfor_cross_link() {
    let t = Template::compile("{{for i in xs}}{{:i}}{{endfor}}", "inv1").unwrap();
    let mut for_idx = None;
    let mut end_for_idx = None;
    t.for_each_token(|idx, tok| match tok.kind {
        Kind::For => for_idx = Some(idx),
        Kind::EndFor => end_for_idx = Some(idx),
        _ => {}
    });
    let (for_idx, end_for_idx) = (for_idx.unwrap(), end_for_idx.unwrap());
    let mut for_ref1 = None;
    let mut end_for_ref1 = None;
    t.for_each_token(|idx, tok| {
        if idx == for_idx {
            for_ref1 = Some(tok.ref1);
        }
        if idx == end_for_idx {
            end_for_ref1 = Some(tok.ref1);
        }
    });
    assert_eq!(for_ref1.unwrap(), end_for_idx as i64);
    assert_eq!(end_for_ref1.unwrap(), for_idx as i64);
}

#[test]
fn invariant_ifthen_else_endif_cross_link() {
    let t = Template::compile("{{if ok}}Y{{else}}N{{endif}}", "inv2").unwrap();
    let (mut if_idx, mut else_idx, mut end_if_idx) = (None, None, None);
    t.for_each_token(|idx, tok| match tok.kind {
        Kind::IfThen => if_idx = Some(idx),
        Kind::Else => else_idx = Some(idx),
        Kind::EndIf => end_if_idx = Some(idx),
        _ => {}
    });
    let (if_idx, else_idx, end_if_idx) = (if_idx.unwrap(), else_idx.unwrap(), end_if_idx.unwrap());
    let (mut if_ref1, mut if_ref2, mut else_ref2) = (None, None, None);
    t.for_each_token(|idx, tok| {
        if idx == if_idx {
            if_ref1 = Some(tok.ref1);
            if_ref2 = Some(tok.ref2);
        }
        if idx == else_idx {
            else_ref2 = Some(tok.ref2);
        }
    });
    assert_eq!(if_ref1.unwrap(), else_idx as i64);
    assert_eq!(if_ref2.unwrap(), end_if_idx as i64);
    assert_eq!(else_ref2.unwrap(), end_if_idx as i64);
}

#[test]
fn invariant_if_without_else_ref1_is_none() {
    let t = Template::compile("{{if ok}}Y{{endif}}", "inv2b").unwrap();
    let mut if_ref1 = None;
    t.for_each_token(|_idx, tok| {
        if tok.kind == Kind::IfThen {
            if_ref1 = Some(tok.ref1);
        }
    });
    assert_eq!(if_ref1.unwrap(), NONE);
}

#[test]
fn invariant_token_vector_ends_with_exactly_one_eof() {
    let t = Template::compile("plain text, no directives", "inv3").unwrap();
    let mut eof_count = 0;
    let mut last_kind = None;
    t.for_each_token(|_idx, tok| {
        if tok.kind == Kind::Eof {
            eof_count += 1;
        }
        last_kind = Some(tok.kind);
    });
    assert_eq!(eof_count, 1);
    assert_eq!(last_kind, Some(Kind::Eof));
}

#[test]
fn invariant_render_is_a_deterministic_function_of_source() {
    let src = "Hello, {{:name}}! {{if vip}}VIP{{endif}}";
    let a = Template::compile(src, "inv4a").unwrap();
    a.set_data("name", Value::string("Ada"));
    a.set_data("vip", Value::Boolean(true));

    let b = Template::compile(src, "inv4b").unwrap();
    b.set_data("name", Value::string("Ada"));
    b.set_data("vip", Value::Boolean(true));

    assert_eq!(a.render().unwrap(), b.render().unwrap());
}

#[test]
fn invariant_dump_round_trip_preserves_the_token_vector() {
    let t = Template::compile("{{for i in xs}}{{:i|uppercase}}{{endfor}}", "inv5").unwrap();
    let path = std::env::temp_dir().join("skein-e2e-invariant-dump");
    t.save_to_file(&path).unwrap();
    let reloaded = Template::create_from_file(&path).unwrap();

    let mut original_tokens = Vec::new();
    t.for_each_token(|_idx, tok| original_tokens.push(tok.clone()));
    let mut reloaded_tokens = Vec::new();
    reloaded.for_each_token(|_idx, tok| reloaded_tokens.push(tok.clone()));

    assert_eq!(original_tokens, reloaded_tokens);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn invariant_html_escape_is_identity_on_ascii_alphanumerics() {
    let t = Template::compile("{{:x}}", "inv6").unwrap();
    t.set_data("x", Value::string("abcXYZ789"));
    assert_eq!(t.render().unwrap(), "abcXYZ789");
}

#[test]
fn invariant_pure_verbatim_template_renders_itself() {
    let t = Template::compile("just plain words with no directives at all", "inv7").unwrap();
    assert_eq!(t.render().unwrap(), "just plain words with no directives at all");
}

#[test]
fn unbalanced_for_is_reported_as_a_compile_error() {
    let err = Template::compile("{{for i in xs}}unterminated", "err1").unwrap_err();
    assert!(matches!(err, CompileError::UnbalancedFor { .. }));
}

#[test]
fn unresolved_variable_falls_back_to_the_get_value_callback() {
    let t = Template::compile("{{:mystery}}", "cb1").unwrap();
    let out = t.render_with(Some(&|head, members| {
        assert_eq!(head, "mystery");
        assert!(members.is_empty());
        Some(Value::string("fallback"))
    }));
    assert_eq!(out.unwrap(), "fallback");
}

fn string_list(items: &[&str]) -> Value {
    struct StringList(Vec<Value>);
    impl skein::WrappedList for StringList {
        fn count(&self) -> usize {
            self.0.len()
        }
        fn item(&self, index: usize) -> Option<Value> {
            self.0.get(index).cloned()
        }
    }
    Value::WrappedList(std::rc::Rc::new(StringList(items.iter().map(|s| Value::string(*s)).collect())))
}
