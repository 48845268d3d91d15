//! Content Node Model: the markup shape of each embeddable media type.
//!
//! Every embed is a block-level element carrying a `data-media-type`
//! discriminator and a `data-media-id` linking it to a [`MediaRecord`]. Each
//! node type knows how to build its element and how to recognize and read one
//! back, so `from_element(&node.to_element())` gives the node again.
//!
//! [`MediaRecord`]: quill_common::MediaRecord

use std::sync::LazyLock;

use quill_common::{MediaId, MediaKind, MediaPayload};
use regex::Regex;

use crate::markup::{Element, Node};
use crate::metadata::LinkMetadata;

pub const ATTR_MEDIA_ID: &str = "data-media-id";
pub const ATTR_MEDIA_TYPE: &str = "data-media-type";
pub const ATTR_YOUTUBE_ID: &str = "data-youtube-id";
pub const ATTR_RAW_HTML: &str = "data-raw-html";
pub const ATTR_HTML_CONTENT: &str = "data-html-content";
pub const ATTR_IMAGE_ID: &str = "data-image-id";
pub const ATTR_IMAGE_NAME: &str = "data-image-name";
pub const ATTR_BOOKMARK: &str = "data-bookmark";
pub const ATTR_PICSUM_ID: &str = "data-picsum-id";

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:https?://)?(?:www\.)?(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/)([A-Za-z0-9_-]{11})",
    )
    .expect("youtube url pattern is valid")
});

/// Pull the 11-character video id out of a `youtube.com/watch?v=`,
/// `youtu.be/` or `youtube.com/embed/` URL.
pub fn youtube_video_id(url: &str) -> Option<&str> {
    YOUTUBE_URL
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn id_attr(el: &Element, name: &str) -> Option<MediaId> {
    el.non_empty_attr(name).map(MediaId::from)
}

fn media_type_is(el: &Element, kind: MediaKind) -> bool {
    el.attr(ATTR_MEDIA_TYPE) == Some(kind.as_str())
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageNode {
    /// `data-image-id`. Absent for images kept inline or pasted in.
    pub id: Option<MediaId>,
    pub src: String,
    pub alt: Option<String>,
    /// `data-image-name`: original file name.
    pub name: Option<String>,
    /// `data-picsum-id`: a remote Picsum photo, never stored.
    pub picsum_id: Option<u32>,
}

impl ImageNode {
    pub fn to_element(&self) -> Element {
        let mut el = Element::new("img").with_attr("src", self.src.as_str());
        if let Some(alt) = &self.alt {
            el.set_attr("alt", alt.as_str());
        }
        if let Some(id) = &self.id {
            el.set_attr(ATTR_IMAGE_ID, id.as_str());
        }
        if let Some(name) = &self.name {
            el.set_attr(ATTR_IMAGE_NAME, name.as_str());
        }
        if let Some(picsum_id) = self.picsum_id {
            el.set_attr(ATTR_PICSUM_ID, picsum_id.to_string());
        }
        el
    }

    pub fn from_element(el: &Element) -> Option<Self> {
        if !el.is("img") {
            return None;
        }
        Some(Self {
            id: id_attr(el, ATTR_IMAGE_ID),
            src: el.attr("src").unwrap_or_default().to_owned(),
            alt: el.attr("alt").map(str::to_owned),
            name: el.non_empty_attr(ATTR_IMAGE_NAME).map(str::to_owned),
            picsum_id: el
                .non_empty_attr(ATTR_PICSUM_ID)
                .and_then(|v| v.trim().parse().ok()),
        })
    }

    /// The id this image refers to. Older markup only carried the file name,
    /// which doubled as the storage id. Picsum photos are remote and their
    /// name is not a storage id.
    pub fn reference(&self) -> Option<MediaId> {
        if self.picsum_id.is_some() {
            return self.id.clone();
        }
        self.id
            .clone()
            .or_else(|| self.name.as_deref().map(MediaId::from))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct YouTubeNode {
    pub id: Option<MediaId>,
    pub video_id: String,
}

impl YouTubeNode {
    pub fn embed_url(&self) -> String {
        embed_url(&self.video_id)
    }

    /// Container `div` wrapping the player `iframe`. Both carry the ids so
    /// either survives an editor that strips one of them.
    pub fn to_element(&self) -> Element {
        let mut container = Element::new("div")
            .with_attr("class", "video-embed")
            .with_attr(ATTR_MEDIA_TYPE, MediaKind::Youtube.as_str());
        if let Some(id) = &self.id {
            container.set_attr(ATTR_MEDIA_ID, id.as_str());
        }
        container.set_attr(ATTR_YOUTUBE_ID, self.video_id.as_str());
        container.with_child(self.iframe())
    }

    fn iframe(&self) -> Element {
        let mut iframe = Element::new("iframe")
            .with_attr("src", self.embed_url())
            .with_attr("width", "100%")
            .with_attr("height", "400")
            .with_attr("frameborder", "0")
            .with_attr("allowfullscreen", "true");
        if let Some(id) = &self.id {
            iframe.set_attr(ATTR_MEDIA_ID, id.as_str());
        }
        iframe.set_attr(ATTR_MEDIA_TYPE, MediaKind::Youtube.as_str());
        iframe.set_attr(ATTR_YOUTUBE_ID, self.video_id.as_str());
        iframe
    }

    /// A tagged container, or a bare iframe tagged the same way.
    pub fn matches(el: &Element) -> bool {
        (el.is("div") || el.is("iframe"))
            && (media_type_is(el, MediaKind::Youtube) || el.has_attr(ATTR_YOUTUBE_ID))
    }

    pub fn from_element(el: &Element) -> Option<Self> {
        if !Self::matches(el) {
            return None;
        }
        let iframe = el
            .children
            .iter()
            .filter_map(Node::as_element)
            .find(|child| child.is("iframe"));
        let id = id_attr(el, ATTR_MEDIA_ID).or_else(|| iframe.and_then(|f| id_attr(f, ATTR_MEDIA_ID)));
        let video_id = el
            .non_empty_attr(ATTR_YOUTUBE_ID)
            .or_else(|| iframe.and_then(|f| f.non_empty_attr(ATTR_YOUTUBE_ID)))
            .or_else(|| el.attr("src").and_then(youtube_video_id))
            .or_else(|| iframe.and_then(|f| f.attr("src")).and_then(youtube_video_id))?;
        Some(Self {
            id,
            video_id: video_id.to_owned(),
        })
    }

    /// `data-media-id`, falling back to the video id for embeds that predate
    /// media ids.
    pub fn reference(&self) -> MediaId {
        self.id
            .clone()
            .unwrap_or_else(|| MediaId::from(self.video_id.as_str()))
    }

    /// Bring an existing youtube element in line with this node. Works on
    /// both container and bare iframe shapes. Returns whether anything changed.
    pub fn sync_element(&self, el: &mut Element) -> bool {
        let mut changed = false;
        if let Some(id) = &self.id {
            changed |= el.set_attr(ATTR_MEDIA_ID, id.as_str());
        }
        changed |= el.set_attr(ATTR_YOUTUBE_ID, self.video_id.as_str());
        if el.is("iframe") {
            return changed | el.set_attr("src", self.embed_url());
        }
        let iframe = el
            .children
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find(|child| child.is("iframe"));
        match iframe {
            Some(iframe) => {
                changed |= iframe.set_attr("src", self.embed_url());
                changed |= iframe.set_attr(ATTR_YOUTUBE_ID, self.video_id.as_str());
                if let Some(id) = &self.id {
                    changed |= iframe.set_attr(ATTR_MEDIA_ID, id.as_str());
                }
            }
            None => {
                el.children.push(Node::Element(self.iframe()));
                changed = true;
            }
        }
        changed
    }
}

pub fn embed_url(video_id: &str) -> String {
    format!("https://www.youtube.com/embed/{video_id}")
}

/// Raw HTML block. The original code is kept escaped in `data-html-content`
/// and rendered live as the element's children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HtmlEmbedNode {
    pub id: Option<MediaId>,
    pub content: String,
}

impl HtmlEmbedNode {
    pub fn to_element(&self) -> Element {
        let mut el = Element::new("div")
            .with_attr(ATTR_RAW_HTML, "true")
            .with_attr(ATTR_MEDIA_TYPE, MediaKind::Html.as_str());
        if let Some(id) = &self.id {
            el.set_attr(ATTR_MEDIA_ID, id.as_str());
        }
        el.set_attr(ATTR_HTML_CONTENT, self.content.as_str());
        el.set_inner_html(&self.content);
        el
    }

    pub fn matches(el: &Element) -> bool {
        el.is("div") && (el.attr(ATTR_RAW_HTML) == Some("true") || media_type_is(el, MediaKind::Html))
    }

    pub fn from_element(el: &Element) -> Option<Self> {
        if !Self::matches(el) {
            return None;
        }
        let content = match el.attr(ATTR_HTML_CONTENT) {
            Some(content) => content.to_owned(),
            None => el.inner_html(),
        };
        Some(Self {
            id: id_attr(el, ATTR_MEDIA_ID),
            content,
        })
    }

    /// Overwrite the stored code and rendered children. Returns whether
    /// anything changed.
    pub fn sync_element(&self, el: &mut Element) -> bool {
        let mut changed = el.set_attr(ATTR_HTML_CONTENT, self.content.as_str());
        let mut rendered = Element::new("div");
        rendered.set_inner_html(&self.content);
        if rendered.children != el.children {
            el.children = rendered.children;
            changed = true;
        }
        changed
    }
}

/// Link preview card. The attributes are authoritative; the card children
/// are a rendering of them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BookmarkNode {
    pub id: Option<MediaId>,
    pub meta: LinkMetadata,
}

const BOOKMARK_FIELDS: [&str; 6] = ["url", "title", "description", "image", "favicon", "site"];

impl BookmarkNode {
    pub fn to_element(&self) -> Element {
        let mut el = Element::new("div")
            .with_attr("class", "bookmark-card")
            .with_attr(ATTR_BOOKMARK, "")
            .with_attr(ATTR_MEDIA_TYPE, MediaKind::Bookmark.as_str());
        if let Some(id) = &self.id {
            el.set_attr(ATTR_MEDIA_ID, id.as_str());
        }
        self.write_fields(&mut el);
        el.children = self.card();
        el
    }

    fn write_fields(&self, el: &mut Element) -> bool {
        let mut changed = false;
        for (name, value) in BOOKMARK_FIELDS.iter().zip(self.meta.fields()) {
            changed |= el.set_attr(name, value);
        }
        changed
    }

    fn card(&self) -> Vec<Node> {
        let meta = &self.meta;
        let link = Element::new("a")
            .with_attr("href", meta.url.as_str())
            .with_attr("target", "_blank")
            .with_attr("rel", "noopener noreferrer")
            .with_child(
                Element::new("div")
                    .with_attr("class", "bookmark-content")
                    .with_child(
                        Element::new("h4")
                            .with_attr("class", "bookmark-title")
                            .with_child(Node::text(&meta.title)),
                    )
                    .with_child(
                        Element::new("p")
                            .with_attr("class", "bookmark-description")
                            .with_child(Node::text(&meta.description)),
                    ),
            )
            .with_child(
                Element::new("div")
                    .with_attr("class", "bookmark-footer")
                    .with_child(
                        Element::new("img")
                            .with_attr("src", meta.favicon.as_str())
                            .with_attr("alt", "")
                            .with_attr("class", "bookmark-favicon"),
                    )
                    .with_child(
                        Element::new("span")
                            .with_attr("class", "bookmark-site")
                            .with_child(Node::text(&meta.site)),
                    ),
            );
        vec![Node::Element(link)]
    }

    pub fn matches(el: &Element) -> bool {
        el.is("div") && (el.has_attr(ATTR_BOOKMARK) || media_type_is(el, MediaKind::Bookmark))
    }

    pub fn from_element(el: &Element) -> Option<Self> {
        if !Self::matches(el) {
            return None;
        }
        let field = |name: &str| el.attr(name).unwrap_or_default().to_owned();
        Some(Self {
            id: id_attr(el, ATTR_MEDIA_ID),
            meta: LinkMetadata {
                url: field("url"),
                title: field("title"),
                description: field("description"),
                image: field("image"),
                favicon: field("favicon"),
                site: field("site"),
            },
        })
    }

    /// Rewrite the card attributes and children to this node's metadata.
    pub fn sync_element(&self, el: &mut Element) -> bool {
        let mut changed = self.write_fields(el);
        let card = self.card();
        if el.children != card {
            el.children = card;
            changed = true;
        }
        changed
    }
}

/// An embeddable node recognized in, or destined for, a post body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentNode {
    Image(ImageNode),
    YouTube(YouTubeNode),
    Html(HtmlEmbedNode),
    Bookmark(BookmarkNode),
}

impl ContentNode {
    pub fn kind(&self) -> MediaKind {
        match self {
            ContentNode::Image(_) => MediaKind::Image,
            ContentNode::YouTube(_) => MediaKind::Youtube,
            ContentNode::Html(_) => MediaKind::Html,
            ContentNode::Bookmark(_) => MediaKind::Bookmark,
        }
    }

    pub fn to_element(&self) -> Element {
        match self {
            ContentNode::Image(node) => node.to_element(),
            ContentNode::YouTube(node) => node.to_element(),
            ContentNode::Html(node) => node.to_element(),
            ContentNode::Bookmark(node) => node.to_element(),
        }
    }

    /// Recognize an element. More specific shapes are tried first, so a
    /// container tagged as a bookmark is never mistaken for an html embed.
    pub fn from_element(el: &Element) -> Option<Self> {
        if let Some(node) = YouTubeNode::from_element(el) {
            return Some(ContentNode::YouTube(node));
        }
        if let Some(node) = BookmarkNode::from_element(el) {
            return Some(ContentNode::Bookmark(node));
        }
        if let Some(node) = HtmlEmbedNode::from_element(el) {
            return Some(ContentNode::Html(node));
        }
        ImageNode::from_element(el).map(ContentNode::Image)
    }

    /// The MediaId this node links to, following each type's lookup rule.
    pub fn media_id(&self) -> Option<MediaId> {
        match self {
            ContentNode::Image(node) => node.reference(),
            ContentNode::YouTube(node) => Some(node.reference()),
            ContentNode::Html(node) => node.id.clone(),
            ContentNode::Bookmark(node) => node.id.clone(),
        }
    }

    /// The node a stored record describes, if the record maps to markup.
    pub fn from_payload(id: &MediaId, payload: &MediaPayload) -> Self {
        let id = Some(id.clone());
        match payload {
            MediaPayload::Image { data, name, .. } => ContentNode::Image(ImageNode {
                id,
                src: data.clone(),
                alt: Some(name.clone()),
                name: Some(name.clone()),
                picsum_id: None,
            }),
            MediaPayload::Youtube { video_id, .. } => ContentNode::YouTube(YouTubeNode {
                id,
                video_id: video_id.clone(),
            }),
            MediaPayload::Html { html_content } => ContentNode::Html(HtmlEmbedNode {
                id,
                content: html_content.clone(),
            }),
            MediaPayload::Bookmark {
                url,
                title,
                description,
                image,
                favicon,
                site,
            } => ContentNode::Bookmark(BookmarkNode {
                id,
                meta: LinkMetadata {
                    url: url.clone(),
                    title: title.clone(),
                    description: description.clone(),
                    image: image.clone(),
                    favicon: favicon.clone(),
                    site: site.clone(),
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Fragment;

    fn reparse(el: &Element) -> Element {
        let fragment = Fragment::parse(&el.to_html()).unwrap();
        fragment.nodes[0].as_element().unwrap().clone()
    }

    #[test]
    fn youtube_url_forms() {
        assert_eq!(youtube_video_id("https://youtu.be/dQw4w9WgXcQ"), Some("dQw4w9WgXcQ"));
        assert_eq!(
            youtube_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=10"),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(youtube_video_id("youtube.com/embed/abc-def_123"), Some("abc-def_123"));
        assert_eq!(youtube_video_id("https://vimeo.com/12345"), None);
        assert_eq!(youtube_video_id("https://youtu.be/short"), None);
        assert_eq!(youtube_video_id("https://youtu.be/ééééééééééé"), None);
        assert_eq!(youtube_video_id("https://youtu.be/ab€defghijkl"), None);
    }

    #[test]
    fn youtube_shape() {
        let node = YouTubeNode {
            id: Some(MediaId::new("youtube_1_2")),
            video_id: "dQw4w9WgXcQ".into(),
        };
        insta::assert_snapshot!(
            node.to_element().to_html(),
            @r#"<div class="video-embed" data-media-type="youtube" data-media-id="youtube_1_2" data-youtube-id="dQw4w9WgXcQ"><iframe src="https://www.youtube.com/embed/dQw4w9WgXcQ" width="100%" height="400" frameborder="0" allowfullscreen="true" data-media-id="youtube_1_2" data-media-type="youtube" data-youtube-id="dQw4w9WgXcQ"></iframe></div>"#
        );
    }

    #[test]
    fn every_node_round_trips_through_markup() {
        let nodes = vec![
            ContentNode::Image(ImageNode {
                id: Some(MediaId::new("image_1_1")),
                src: "data:image/png;base64,AAAA".into(),
                alt: Some("cat.png".into()),
                name: Some("cat.png".into()),
                picsum_id: None,
            }),
            ContentNode::Image(ImageNode {
                id: None,
                src: "https://picsum.photos/id/237/800/600".into(),
                alt: Some("Picsum Photo 237".into()),
                name: Some("picsum-237.jpg".into()),
                picsum_id: Some(237),
            }),
            ContentNode::YouTube(YouTubeNode {
                id: Some(MediaId::new("youtube_1_2")),
                video_id: "dQw4w9WgXcQ".into(),
            }),
            ContentNode::Html(HtmlEmbedNode {
                id: Some(MediaId::new("html_1_3")),
                content: r#"<blockquote class="tweet">"quoted" & <b>bold</b></blockquote>"#.into(),
            }),
            ContentNode::Bookmark(BookmarkNode {
                id: Some(MediaId::new("bookmark_1_4")),
                meta: LinkMetadata {
                    url: "https://github.com/rust-lang/rust".into(),
                    title: "Rust - GitHub Repository".into(),
                    description: "Explore code, issues, and pull requests on GitHub".into(),
                    image: String::new(),
                    favicon: "https://www.google.com/s2/favicons?sz=16&domain=github.com".into(),
                    site: "github.com".into(),
                },
            }),
        ];
        for node in nodes {
            let parsed = ContentNode::from_element(&reparse(&node.to_element()));
            assert_eq!(parsed.as_ref(), Some(&node));
            assert_eq!(parsed.and_then(|n| n.media_id()), node.media_id());
        }
    }

    #[test]
    fn bare_iframe_is_recognized() {
        let fragment = Fragment::parse(
            r#"<iframe src="https://www.youtube.com/embed/dQw4w9WgXcQ" data-media-type="youtube"></iframe>"#,
        )
        .unwrap();
        let el = fragment.nodes[0].as_element().unwrap();
        let node = YouTubeNode::from_element(el).unwrap();
        assert_eq!(node.video_id, "dQw4w9WgXcQ");
        assert_eq!(node.id, None);
        assert_eq!(node.reference(), MediaId::new("dQw4w9WgXcQ"));
    }

    #[test]
    fn image_reference_falls_back_to_name() {
        let el = Element::new("img")
            .with_attr("src", "x")
            .with_attr(ATTR_IMAGE_NAME, "image_9_9");
        let node = ImageNode::from_element(&el).unwrap();
        assert_eq!(node.reference(), Some(MediaId::new("image_9_9")));
        let plain = ImageNode::from_element(&Element::new("img")).unwrap();
        assert_eq!(plain.reference(), None);

        let picsum = el.clone().with_attr(ATTR_PICSUM_ID, "237");
        assert_eq!(ImageNode::from_element(&picsum).unwrap().reference(), None);
    }

    #[test]
    fn youtube_sync_heals_divergent_video() {
        let node = YouTubeNode {
            id: Some(MediaId::new("youtube_1_2")),
            video_id: "dQw4w9WgXcQ".into(),
        };
        let mut stale = YouTubeNode {
            id: node.id.clone(),
            video_id: "aaaaaaaaaaa".into(),
        }
        .to_element();
        assert!(node.sync_element(&mut stale));
        assert_eq!(stale, node.to_element());
        assert!(!node.sync_element(&mut stale));
    }
}
