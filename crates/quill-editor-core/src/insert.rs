//! Typed insertion requests.
//!
//! A request is validated and turned into the markup fragment to splice into
//! the body plus the [`MediaRecord`] to persist, both sharing one freshly
//! generated [`MediaId`]. Persisting is best effort: when the blob store
//! rejects the write the media stays inline in the markup.

use std::sync::LazyLock;

use base64::{Engine, engine::general_purpose::STANDARD};
use bytes::Bytes;
use mime_sniffer::MimeTypeSniffer;
use regex::Regex;
use quill_common::{
    BlobStore, KeyValueStore, MediaId, MediaKind, MediaPayload, MediaRecord, ValidationError,
};

use crate::markup::{Element, Fragment, Node};
use crate::metadata::{LinkMetadata, parse_link};
use crate::nodes::{BookmarkNode, ContentNode, HtmlEmbedNode, ImageNode, YouTubeNode, youtube_video_id};

/// An image file read into memory, checked and ready to embed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageUpload {
    /// Original file name
    pub name: String,
    /// MIME type sniffed from the bytes
    pub mime_type: String,
    pub data: Bytes,
}

impl ImageUpload {
    /// Check an uploaded file: it must sniff as an image and be no larger
    /// than `max_bytes`.
    pub fn from_bytes(
        name: impl Into<String>,
        data: impl Into<Bytes>,
        max_bytes: usize,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let data = data.into();
        let mime_type = data
            .sniff_mime_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !mime_type.starts_with("image/") {
            return Err(ValidationError::NotAnImage(name));
        }
        if data.len() > max_bytes {
            return Err(ValidationError::FileTooLarge {
                size: data.len(),
                max: max_bytes,
            });
        }
        Ok(Self {
            name,
            mime_type,
            data,
        })
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.data))
    }

    pub fn to_payload(&self) -> MediaPayload {
        MediaPayload::Image {
            data: self.data_url(),
            name: self.name.clone(),
            size: self.data.len(),
            mime_type: self.mime_type.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertRequest {
    /// Uploaded image, stored as a data URL record.
    Image(ImageUpload),
    /// Remote image. Inline only, nothing is stored.
    ImageUrl(String),
    /// A YouTube link in any of the accepted forms.
    YouTube(String),
    /// Raw HTML code.
    Html(String),
    Bookmark(LinkMetadata),
    /// A Picsum photo: an id (`237`), `id/width/height`, or a
    /// `picsum.photos/id/N` link. Inline only.
    Picsum(String),
    /// A tweet link, embedded as an html block.
    Tweet(String),
    /// Horizontal rule.
    Divider,
}

/// Highest image id Picsum serves.
pub const PICSUM_MAX_ID: u32 = 1084;
const PICSUM_WIDTH: u32 = 800;
const PICSUM_HEIGHT: u32 = 600;

static PICSUM_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"picsum\.photos/id/(\d+)").expect("picsum url pattern is valid"));

/// Picsum image id from user input.
pub fn picsum_image_id(input: &str) -> Result<u32, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ValidationError::Empty("Picsum image ID"));
    }
    let raw = match PICSUM_URL.captures(input).and_then(|caps| caps.get(1)) {
        Some(m) => m.as_str(),
        None => {
            let parts: Vec<&str> = input.split('/').collect();
            match parts.as_slice() {
                [id] | [id, _, _] => *id,
                _ => return Err(ValidationError::InvalidPicsumId(input.to_owned())),
            }
        }
    };
    match raw.trim().parse::<u32>() {
        Ok(id) if id <= PICSUM_MAX_ID => Ok(id),
        _ => Err(ValidationError::InvalidPicsumId(input.to_owned())),
    }
}

/// The block shown for an embedded tweet.
fn tweet_markup(url: &str) -> String {
    let link = Element::new("a")
        .with_attr("href", url)
        .with_attr("target", "_blank")
        .with_child(Node::text(url));
    Element::new("div")
        .with_attr("class", "tweet-embed")
        .with_child(
            Element::new("blockquote")
                .with_child(Element::new("p").with_child(Node::text("Twitter embed")))
                .with_child(link),
        )
        .to_html()
}

/// A validated request: what to splice in and what to store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedInsert {
    pub node: Option<ContentNode>,
    pub record: Option<MediaRecord>,
}

/// Outcome of [`insert_media`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Insertion {
    pub fragment: Fragment,
    /// Id linking the inserted node to its record, if it has one.
    pub media_id: Option<MediaId>,
    /// Whether the record made it into the blob store.
    pub persisted: bool,
}

impl InsertRequest {
    pub fn kind(&self) -> Option<MediaKind> {
        match self {
            InsertRequest::Image(_) | InsertRequest::ImageUrl(_) => Some(MediaKind::Image),
            InsertRequest::YouTube(_) => Some(MediaKind::Youtube),
            InsertRequest::Html(_) | InsertRequest::Tweet(_) => Some(MediaKind::Html),
            InsertRequest::Picsum(_) => Some(MediaKind::Image),
            InsertRequest::Bookmark(_) => Some(MediaKind::Bookmark),
            InsertRequest::Divider => None,
        }
    }

    /// Validate the request and build its node and record.
    pub fn prepare(self) -> Result<PreparedInsert, ValidationError> {
        match self {
            InsertRequest::Image(upload) => {
                let id = MediaId::generate(MediaKind::Image);
                let node = ContentNode::Image(ImageNode {
                    id: Some(id.clone()),
                    src: upload.data_url(),
                    alt: Some(upload.name.clone()),
                    name: Some(upload.name.clone()),
                    picsum_id: None,
                });
                Ok(PreparedInsert {
                    node: Some(node),
                    record: Some(MediaRecord::new(id, upload.to_payload())),
                })
            }
            InsertRequest::ImageUrl(url) => {
                if url.trim().is_empty() {
                    return Err(ValidationError::Empty("Image URL"));
                }
                let url = parse_link(&url)?;
                Ok(PreparedInsert {
                    node: Some(ContentNode::Image(ImageNode {
                        id: None,
                        src: url.to_string(),
                        alt: None,
                        name: None,
                        picsum_id: None,
                    })),
                    record: None,
                })
            }
            InsertRequest::YouTube(url) => {
                let url = url.trim();
                if url.is_empty() {
                    return Err(ValidationError::Empty("YouTube URL"));
                }
                let video_id = youtube_video_id(url)
                    .ok_or_else(|| ValidationError::InvalidYouTubeUrl(url.to_owned()))?
                    .to_owned();
                let id = MediaId::generate(MediaKind::Youtube);
                let record = MediaRecord::new(
                    id.clone(),
                    MediaPayload::Youtube {
                        video_id: video_id.clone(),
                        url: url.to_owned(),
                    },
                );
                Ok(PreparedInsert {
                    node: Some(ContentNode::YouTube(YouTubeNode {
                        id: Some(id),
                        video_id,
                    })),
                    record: Some(record),
                })
            }
            InsertRequest::Html(code) => {
                let content = code.trim();
                if content.is_empty() {
                    return Err(ValidationError::Empty("HTML code"));
                }
                Ok(html_embed(content.to_owned()))
            }
            InsertRequest::Tweet(url) => {
                let url = url.trim();
                if url.is_empty() {
                    return Err(ValidationError::Empty("Twitter URL"));
                }
                parse_link(url)?;
                Ok(html_embed(tweet_markup(url)))
            }
            InsertRequest::Picsum(input) => {
                let picsum_id = picsum_image_id(&input)?;
                Ok(PreparedInsert {
                    node: Some(ContentNode::Image(ImageNode {
                        id: None,
                        src: format!(
                            "https://picsum.photos/id/{picsum_id}/{PICSUM_WIDTH}/{PICSUM_HEIGHT}"
                        ),
                        alt: Some(format!("Picsum Photo {picsum_id}")),
                        name: Some(format!("picsum-{picsum_id}.jpg")),
                        picsum_id: Some(picsum_id),
                    })),
                    record: None,
                })
            }
            InsertRequest::Bookmark(mut meta) => {
                let url = parse_link(&meta.url)?;
                let domain = url.host_str().unwrap_or_default();
                if meta.site.trim().is_empty() {
                    meta.site = domain.to_owned();
                }
                if meta.title.trim().is_empty() {
                    meta.title = domain.to_owned();
                }
                let id = MediaId::generate(MediaKind::Bookmark);
                let record = MediaRecord::new(id.clone(), meta.to_payload());
                Ok(PreparedInsert {
                    node: Some(ContentNode::Bookmark(BookmarkNode { id: Some(id), meta })),
                    record: Some(record),
                })
            }
            InsertRequest::Divider => Ok(PreparedInsert {
                node: None,
                record: None,
            }),
        }
    }
}

fn html_embed(content: String) -> PreparedInsert {
    let id = MediaId::generate(MediaKind::Html);
    let record = MediaRecord::new(
        id.clone(),
        MediaPayload::Html {
            html_content: content.clone(),
        },
    );
    PreparedInsert {
        node: Some(ContentNode::Html(HtmlEmbedNode {
            id: Some(id),
            content,
        })),
        record: Some(record),
    }
}

impl PreparedInsert {
    pub fn media_id(&self) -> Option<MediaId> {
        self.record.as_ref().map(|r| r.id.clone())
    }

    pub fn fragment(&self) -> Fragment {
        let mut fragment = Fragment::new();
        match &self.node {
            Some(node) => fragment.push(node.to_element()),
            None => fragment.push(Element::new("hr")),
        }
        fragment
    }

    /// Store the record, if any. A failed write keeps the media inline:
    /// images lose their id attributes so the data URL in `src` stands on
    /// its own, other embeds already carry their content in attributes.
    pub fn commit<S: KeyValueStore>(self, blobs: &BlobStore<S>) -> Insertion {
        let Some(record) = &self.record else {
            return Insertion {
                fragment: self.fragment(),
                media_id: None,
                persisted: false,
            };
        };
        match blobs.put(record) {
            Ok(()) => Insertion {
                fragment: self.fragment(),
                media_id: Some(record.id.clone()),
                persisted: true,
            },
            Err(e) => {
                tracing::warn!(
                    media_id = %record.id,
                    kind = %record.kind(),
                    error = %e,
                    "could not store media record, keeping it inline"
                );
                match &self.node {
                    Some(ContentNode::Image(image)) => {
                        let inline = ContentNode::Image(ImageNode {
                            id: None,
                            name: None,
                            ..image.clone()
                        });
                        let mut fragment = Fragment::new();
                        fragment.push(inline.to_element());
                        Insertion {
                            fragment,
                            media_id: None,
                            persisted: false,
                        }
                    }
                    _ => Insertion {
                        fragment: self.fragment(),
                        media_id: Some(record.id.clone()),
                        persisted: false,
                    },
                }
            }
        }
    }
}

/// Validate a request, store its record and return the markup to insert.
pub fn insert_media<S: KeyValueStore>(
    request: InsertRequest,
    blobs: &BlobStore<S>,
) -> Result<Insertion, ValidationError> {
    Ok(request.prepare()?.commit(blobs))
}

#[cfg(test)]
mod tests {
    use quill_common::MemoryStore;

    use super::*;
    use crate::extract::extract;

    const PNG: &[u8] = &[
        0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0, 0, 0, 13, b'I', b'H', b'D', b'R',
    ];

    #[test]
    fn image_upload_is_sniffed_and_checked() {
        let upload = ImageUpload::from_bytes("cat.png", PNG.to_vec(), 1024).unwrap();
        assert_eq!(upload.mime_type, "image/png");
        assert!(upload.data_url().starts_with("data:image/png;base64,iVBORw0KGgo"));

        assert_eq!(
            ImageUpload::from_bytes("cat.png", PNG.to_vec(), 4),
            Err(ValidationError::FileTooLarge { size: PNG.len(), max: 4 })
        );
        assert_eq!(
            ImageUpload::from_bytes("notes.txt", b"just some text".to_vec(), 1024),
            Err(ValidationError::NotAnImage("notes.txt".into()))
        );
    }

    #[test]
    fn youtube_request_shares_id_between_node_and_record() {
        let blobs = BlobStore::new(MemoryStore::new());
        let insertion =
            insert_media(InsertRequest::YouTube("https://youtu.be/dQw4w9WgXcQ".into()), &blobs).unwrap();
        assert!(insertion.persisted);
        let id = insertion.media_id.clone().unwrap();
        assert_eq!(id.kind_hint(), Some(MediaKind::Youtube));
        assert_eq!(extract(&insertion.fragment.to_html()), vec![id.clone()]);

        let record = blobs.get(&id).unwrap();
        assert_eq!(
            record.payload,
            MediaPayload::Youtube {
                video_id: "dQw4w9WgXcQ".into(),
                url: "https://youtu.be/dQw4w9WgXcQ".into(),
            }
        );
    }

    #[test]
    fn invalid_input_is_rejected_before_anything_is_stored() {
        let blobs = BlobStore::new(MemoryStore::new());
        assert_eq!(
            insert_media(InsertRequest::YouTube("https://vimeo.com/1".into()), &blobs),
            Err(ValidationError::InvalidYouTubeUrl("https://vimeo.com/1".into()))
        );
        assert_eq!(
            insert_media(InsertRequest::Html("   \n".into()), &blobs),
            Err(ValidationError::Empty("HTML code"))
        );
        assert_eq!(
            insert_media(InsertRequest::ImageUrl("not a url".into()), &blobs),
            Err(ValidationError::InvalidUrl("not a url".into()))
        );
        assert!(blobs.list_ids().unwrap().is_empty());
    }

    #[test]
    fn html_is_trimmed_and_stored() {
        let blobs = BlobStore::new(MemoryStore::new());
        let insertion = insert_media(InsertRequest::Html("  <b>hi</b>\n".into()), &blobs).unwrap();
        let id = insertion.media_id.unwrap();
        assert_eq!(
            blobs.get(&id).unwrap().payload,
            MediaPayload::Html {
                html_content: "<b>hi</b>".into()
            }
        );
        let html = insertion.fragment.to_html();
        assert!(html.contains(r#"data-html-content="&lt;b&gt;hi&lt;/b&gt;""#));
        assert!(html.ends_with("><b>hi</b></div>"));
    }

    #[test]
    fn image_url_and_divider_store_nothing() {
        let blobs = BlobStore::new(MemoryStore::new());
        let image =
            insert_media(InsertRequest::ImageUrl("https://example.com/a.jpg".into()), &blobs).unwrap();
        assert_eq!(image.fragment.to_html(), r#"<img src="https://example.com/a.jpg">"#);
        assert_eq!(image.media_id, None);

        let divider = insert_media(InsertRequest::Divider, &blobs).unwrap();
        assert_eq!(divider.fragment.to_html(), "<hr>");
        assert!(blobs.backend().is_empty());
    }

    #[test]
    fn picsum_input_forms() {
        assert_eq!(picsum_image_id("237"), Ok(237));
        assert_eq!(picsum_image_id(" 10/1200/800 "), Ok(10));
        assert_eq!(picsum_image_id("https://picsum.photos/id/1084/200/300"), Ok(1084));
        assert_eq!(picsum_image_id("0"), Ok(0));

        assert_eq!(picsum_image_id("  "), Err(ValidationError::Empty("Picsum image ID")));
        for bad in ["1085", "-1", "dog", "1/2", "https://picsum.photos/seed/x"] {
            assert_eq!(
                picsum_image_id(bad),
                Err(ValidationError::InvalidPicsumId(bad.into())),
                "{bad}"
            );
        }
    }

    #[test]
    fn picsum_photo_is_inline_and_unreferenced() {
        let blobs = BlobStore::new(MemoryStore::new());
        let insertion = insert_media(InsertRequest::Picsum("237".into()), &blobs).unwrap();
        insta::assert_snapshot!(
            insertion.fragment.to_html(),
            @r#"<img src="https://picsum.photos/id/237/800/600" alt="Picsum Photo 237" data-image-name="picsum-237.jpg" data-picsum-id="237">"#
        );
        assert_eq!(insertion.media_id, None);
        assert!(extract(&insertion.fragment.to_html()).is_empty());
        assert!(blobs.backend().is_empty());
    }

    #[test]
    fn tweet_is_stored_as_html_embed() {
        let blobs = BlobStore::new(MemoryStore::new());
        assert_eq!(
            insert_media(InsertRequest::Tweet(" ".into()), &blobs),
            Err(ValidationError::Empty("Twitter URL"))
        );
        assert_eq!(
            insert_media(InsertRequest::Tweet("twitter status".into()), &blobs),
            Err(ValidationError::InvalidUrl("twitter status".into()))
        );

        let url = "https://twitter.com/rustlang/status/123456";
        let insertion = insert_media(InsertRequest::Tweet(url.into()), &blobs).unwrap();
        let id = insertion.media_id.clone().unwrap();
        assert_eq!(id.kind_hint(), Some(MediaKind::Html));
        let MediaPayload::Html { html_content } = blobs.get(&id).unwrap().payload else {
            panic!("tweet should be stored as html");
        };
        insta::assert_snapshot!(
            html_content,
            @r#"<div class="tweet-embed"><blockquote><p>Twitter embed</p><a href="https://twitter.com/rustlang/status/123456" target="_blank">https://twitter.com/rustlang/status/123456</a></blockquote></div>"#
        );
        assert_eq!(extract(&insertion.fragment.to_html()), vec![id]);
    }

    #[test]
    fn quota_failure_keeps_image_inline() {
        let blobs = BlobStore::new(MemoryStore::with_quota(32));
        let upload = ImageUpload::from_bytes("cat.png", PNG.to_vec(), 1024).unwrap();
        let data_url = upload.data_url();
        let insertion = insert_media(InsertRequest::Image(upload), &blobs).unwrap();

        assert!(!insertion.persisted);
        assert_eq!(insertion.media_id, None);
        assert_eq!(
            insertion.fragment.to_html(),
            format!(r#"<img src="{data_url}" alt="cat.png">"#)
        );
        assert!(blobs.backend().is_empty());
    }
}
