//! Parser and serializer behavior on the kinds of markup the editor produces
//! and the kinds it has to put up with.

use quill_common::MarkupErrorKind;

use super::*;

fn round_trip(src: &str) -> String {
    Fragment::parse(src).expect("parse failed").to_html()
}

#[test]
fn editor_output_round_trips_unchanged() {
    let src = concat!(
        r#"<h2>Hello</h2><p>Some <strong>bold</strong> &amp; <em>plain</em> text.</p>"#,
        r#"<img src="data:image/png;base64,AAAA" alt="cat.png" data-image-id="image_1_2">"#,
        r#"<p>after<br>break</p><hr><!-- note -->"#,
    );
    assert_eq!(round_trip(src), src);
}

#[test]
fn self_closing_syntax_is_preserved() {
    insta::assert_snapshot!(round_trip(r#"<p>a<br/>b</p><img src="x.png" />"#), @r#"<p>a<br/>b</p><img src="x.png"/>"#);
}

#[test]
fn attributes_are_decoded_and_reescaped() {
    let fragment = Fragment::parse(r#"<div data-html-content="&lt;b&gt;hi&lt;/b&gt; &amp; more">x</div>"#).unwrap();
    let div = fragment.find_element(|el| el.is("div")).unwrap();
    assert_eq!(div.attr("data-html-content"), Some("<b>hi</b> & more"));
    insta::assert_snapshot!(fragment.to_html(), @r#"<div data-html-content="&lt;b&gt;hi&lt;/b&gt; &amp; more">x</div>"#);
}

#[test]
fn unquoted_single_quoted_and_boolean_attributes() {
    let fragment = Fragment::parse("<iframe width=100% src='https://x.test/a' allowfullscreen></iframe>").unwrap();
    let iframe = fragment.find_element(|el| el.is("iframe")).unwrap();
    assert_eq!(iframe.attr("width"), Some("100%"));
    assert_eq!(iframe.attr("src"), Some("https://x.test/a"));
    assert_eq!(iframe.attr("allowfullscreen"), Some(""));
    assert!(iframe.has_attr("allowfullscreen"));
}

#[test]
fn names_are_lowercased_and_first_duplicate_wins() {
    let fragment = Fragment::parse(r#"<DIV Data-Media-Id="a" data-media-id="b"></DIV>"#).unwrap();
    let div = fragment.find_element(|el| el.is("div")).unwrap();
    assert_eq!(div.attr("data-media-id"), Some("a"));
    assert_eq!(fragment.to_html(), r#"<div data-media-id="a"></div>"#);
}

#[test]
fn unbalanced_tags_are_repaired() {
    assert_eq!(round_trip("<p>one</span> two"), "<p>one two</p>");
    assert_eq!(
        round_trip("<div><p>inner</div><p>next</p>"),
        "<div><p>inner</p></div><p>next</p>"
    );
}

#[test]
fn stray_angle_brackets_are_text() {
    assert_eq!(round_trip("a < b and 3<4"), "a < b and 3<4");
    assert_eq!(round_trip("<p>x </ y</p>"), "<p>x </ y</p>");
}

#[test]
fn script_content_is_not_parsed() {
    let src = r#"<script>if (a < b) { document.write("<p>"); }</script><p>ok</p>"#;
    let fragment = Fragment::parse(src).unwrap();
    assert_eq!(fragment.nodes.len(), 2);
    assert_eq!(fragment.to_html(), src);
}

#[test]
fn unterminated_constructs_are_errors() {
    let err = Fragment::parse("<p>hi</p><!-- never closed").unwrap_err();
    assert_eq!(err.kind(), &MarkupErrorKind::UnterminatedComment);
    assert_eq!(err.offset(), 9);

    let err = Fragment::parse(r#"<img src="data:abc"#).unwrap_err();
    assert_eq!(
        err.kind(),
        &MarkupErrorKind::UnterminatedAttribute("src".into())
    );

    let err = Fragment::parse("<p>text <div class=x").unwrap_err();
    assert_eq!(err.kind(), &MarkupErrorKind::UnterminatedTag("div".into()));
}

#[test]
fn plain_text_separates_blocks() {
    let fragment =
        Fragment::parse("<h1>Title</h1><p>First &amp; <b>bold</b></p><p></p><ul><li>one</li><li>two</li></ul>")
            .unwrap();
    assert_eq!(fragment.plain_text(), "Title\n\nFirst & bold\n\none\n\ntwo");
}

#[test]
fn text_node_constructor_escapes() {
    let mut out = String::new();
    Node::text("a < b & c").write_html(&mut out);
    assert_eq!(out, "a &lt; b &amp; c");
}

#[test]
fn set_attr_reports_changes() {
    let mut el = Element::new("img").with_attr("src", "a.png");
    assert!(!el.set_attr("src", "a.png"));
    assert!(el.set_attr("src", "b.png"));
    assert!(el.set_attr("alt", "b"));
    assert_eq!(el.to_html(), r#"<img src="b.png" alt="b">"#);
    assert!(el.remove_attr("alt"));
    assert!(!el.remove_attr("alt"));
}

#[test]
fn visit_can_skip_subtrees() {
    let fragment = Fragment::parse(r#"<div class="card"><img src="a"></div><img src="b">"#).unwrap();
    let mut seen = Vec::new();
    fragment.visit_elements(|el| {
        if el.is("img") {
            seen.push(el.attr("src").unwrap_or_default().to_owned());
        }
        if el.attr("class") == Some("card") {
            Visit::SkipChildren
        } else {
            Visit::Descend
        }
    });
    assert_eq!(seen, vec!["b".to_owned()]);
}

#[test]
fn find_element_mut_edits_in_place() {
    let mut fragment = Fragment::parse(r#"<p><img src="a"></p><img src="b">"#).unwrap();
    let img = fragment
        .find_element_mut(|el| el.attr("src") == Some("b"))
        .unwrap();
    img.set_attr("alt", "second");
    assert_eq!(fragment.to_html(), r#"<p><img src="a"></p><img src="b" alt="second">"#);
}
