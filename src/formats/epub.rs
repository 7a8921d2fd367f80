//! In-memory EPUB engine.

use crate::error::{AppError, Result};
use crate::reader::engine::{
    BookOptions, BookSource, EngineFactory, EpubEngine, EventKind, LocationReport, Navigation,
    OpenAs, Rendition, RenditionEvent, RenditionOptions,
};
use crate::reader::toc::NavItem;
use crate::storage::BlobStore;
use roxmltree::{Document, Node, ParsingOptions};
use std::collections::{BTreeSet, HashMap};
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;
use std::task::Poll;
use zip::ZipArchive;

const OPS_NS: &str = "http://www.idpf.org/2007/ops";
const NCX_MEDIA_TYPE: &str = "application/x-dtbncx+xml";

type Archive = ZipArchive<Cursor<Arc<[u8]>>>;

/// Parsed package document of an EPUB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpubPackage {
    /// `dc:title`, if present.
    pub title: Option<String>,
    /// Directory of the OPF inside the archive, without trailing slash.
    pub opf_dir: String,
    /// Reading order, as hrefs relative to the OPF directory.
    pub spine: Vec<String>,
    /// Table of contents, hrefs relative to the OPF directory.
    pub toc: Vec<NavItem>,
}

#[derive(Debug)]
struct ManifestItem {
    href: String,
    media_type: String,
    properties: String,
}

impl EpubPackage {
    /// Parse an EPUB held in memory.
    pub fn parse(data: Arc<[u8]>) -> Result<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        Self::from_archive(&mut archive)
    }

    /// Parse an EPUB file from disk.
    pub fn open(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::parse(Arc::from(data))
    }

    fn from_archive(archive: &mut Archive) -> Result<Self> {
        let opf_path = find_opf_path(archive)?;
        let opf_dir = parent_dir(&opf_path).to_string();
        let opf = read_member(archive, &opf_path)?;
        let doc = Document::parse(&opf)?;

        let title = doc
            .descendants()
            .find(|n| n.has_tag_name("title"))
            .and_then(|n| n.text())
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let mut manifest: HashMap<String, ManifestItem> = HashMap::new();
        for node in doc.descendants().filter(|n| n.has_tag_name("item")) {
            if let (Some(id), Some(href)) = (node.attribute("id"), node.attribute("href")) {
                manifest.insert(
                    id.to_string(),
                    ManifestItem {
                        href: decode_href(href),
                        media_type: node.attribute("media-type").unwrap_or_default().to_string(),
                        properties: node.attribute("properties").unwrap_or_default().to_string(),
                    },
                );
            }
        }

        let spine_node = doc.descendants().find(|n| n.has_tag_name("spine"));
        let spine: Vec<String> = spine_node
            .iter()
            .flat_map(|spine| spine.children().filter(|n| n.has_tag_name("itemref")))
            .filter_map(|n| n.attribute("idref"))
            .filter_map(|idref| manifest.get(idref))
            .map(|item| item.href.clone())
            .collect();

        if spine.is_empty() {
            return Err(AppError::InvalidFormat("EPUB spine is empty".into()));
        }

        let nav_item = manifest
            .values()
            .find(|item| item.properties.split_whitespace().any(|p| p == "nav"));
        let ncx_item = spine_node
            .and_then(|n| n.attribute("toc"))
            .and_then(|id| manifest.get(id))
            .or_else(|| manifest.values().find(|item| item.media_type == NCX_MEDIA_TYPE));

        let toc = if let Some(item) = nav_item {
            let path = join_path(&opf_dir, &item.href);
            let content = read_member(archive, &path)?;
            parse_nav_document(&content, parent_dir(&path), &opf_dir)?
        } else if let Some(item) = ncx_item {
            let path = join_path(&opf_dir, &item.href);
            let content = read_member(archive, &path)?;
            parse_ncx(&content, parent_dir(&path), &opf_dir)?
        } else {
            Vec::new()
        };

        Ok(Self {
            title,
            opf_dir,
            spine,
            toc,
        })
    }

    /// Spine position of an href (fragment ignored).
    pub fn spine_index(&self, href: &str) -> Option<usize> {
        let path = strip_fragment(href);
        self.spine.iter().position(|entry| entry == path)
    }

    /// Archive path of an OPF-relative href.
    pub fn member_path(&self, href: &str) -> String {
        join_path(&self.opf_dir, strip_fragment(href))
    }
}

/// Builds [`ArchiveEngine`]s, resolving URL sources through a blob store.
#[derive(Clone, Default)]
pub struct ArchiveEngineFactory {
    blobs: Option<Arc<dyn BlobStore>>,
}

impl ArchiveEngineFactory {
    /// Factory that only accepts in-memory sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory that can also load URLs issued by `blobs`.
    pub fn with_blobs(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs: Some(blobs) }
    }
}

impl EngineFactory for ArchiveEngineFactory {
    type Engine = ArchiveEngine;

    fn construct(&mut self, source: &BookSource, options: &BookOptions) -> Result<ArchiveEngine> {
        match (options.open_as, source) {
            (Some(OpenAs::Directory), _) => {
                return Err(AppError::InvalidFormat(
                    "Unpacked publications are not supported".into(),
                ));
            }
            (Some(OpenAs::Binary), BookSource::Url(url)) => {
                return Err(AppError::InvalidFormat(format!(
                    "Expected archive data, got a URL: {}",
                    url
                )));
            }
            _ => {}
        }

        let data = match source {
            BookSource::Binary(data) => data.clone(),
            BookSource::Url(url) => {
                let blobs = self.blobs.as_ref().ok_or_else(|| {
                    AppError::Engine(format!("No blob store to load {}", url))
                })?;
                Arc::from(blobs.read_url(url)?)
            }
        };

        ArchiveEngine::new(data)
    }
}

/// Engine over an EPUB archive held in memory.
pub struct ArchiveEngine {
    data: Arc<[u8]>,
    package: Option<Arc<EpubPackage>>,
    destroyed: bool,
}

impl ArchiveEngine {
    /// Open an archive. The package document is parsed on first poll.
    pub fn new(data: Arc<[u8]>) -> Result<Self> {
        // Fail early on anything that is not a zip.
        ZipArchive::new(Cursor::new(data.clone()))?;
        Ok(Self {
            data,
            package: None,
            destroyed: false,
        })
    }

    fn package(&mut self) -> Result<Arc<EpubPackage>> {
        if self.destroyed {
            return Err(AppError::Engine("Engine was destroyed".into()));
        }
        if let Some(package) = &self.package {
            return Ok(package.clone());
        }
        let package = Arc::new(EpubPackage::parse(self.data.clone())?);
        self.package = Some(package.clone());
        Ok(package)
    }

    /// Book title, once the package is parsed.
    pub fn title(&self) -> Option<&str> {
        self.package.as_ref().and_then(|p| p.title.as_deref())
    }

    /// Raw bytes of the archive member an OPF-relative href points to.
    pub fn resource(&mut self, href: &str) -> Result<Vec<u8>> {
        let package = self.package()?;
        let path = package.member_path(href);
        let mut archive = ZipArchive::new(Cursor::new(self.data.clone()))?;
        let mut file = archive.by_name(&path).map_err(|e| match e {
            zip::result::ZipError::FileNotFound => AppError::NotFound(format!("Resource {}", href)),
            other => AppError::Zip(other),
        })?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl EpubEngine for ArchiveEngine {
    type Rendition = ArchiveRendition;

    fn poll_navigation(&mut self) -> Poll<Result<Navigation>> {
        Poll::Ready(self.package().map(|package| Navigation {
            toc: package.toc.clone(),
        }))
    }

    fn render_to(&mut self, container: &str, options: &RenditionOptions) -> Result<ArchiveRendition> {
        let package = self.package()?;
        tracing::debug!(container, flow = ?options.flow, sections = package.spine.len(), "Rendering book");
        Ok(ArchiveRendition {
            package,
            position: 0,
            subscribed: BTreeSet::new(),
            events: Vec::new(),
        })
    }

    fn destroy(&mut self) {
        self.package = None;
        self.destroyed = true;
    }
}

/// Rendition that tracks a position in the spine.
pub struct ArchiveRendition {
    package: Arc<EpubPackage>,
    position: usize,
    subscribed: BTreeSet<EventKind>,
    events: Vec<RenditionEvent>,
}

impl ArchiveRendition {
    /// Spine href currently displayed.
    pub fn current(&self) -> &str {
        &self.package.spine[self.position]
    }

    /// Spine index currently displayed.
    pub fn position(&self) -> usize {
        self.position
    }

    fn report(&mut self, start: String) {
        let end = self.current().to_string();
        self.queue(RenditionEvent::LocationChanged(LocationReport { start, end }));
    }

    /// Events nobody subscribed to are dropped.
    fn queue(&mut self, event: RenditionEvent) {
        if self.subscribed.contains(&event.kind()) {
            self.events.push(event);
        }
    }

    fn move_to(&mut self, position: usize) {
        if position != self.position {
            self.position = position;
            let start = self.current().to_string();
            self.report(start);
        }
    }
}

impl Rendition for ArchiveRendition {
    fn display(&mut self, target: Option<&str>) -> Result<()> {
        let Some(target) = target else {
            self.position = 0;
            let start = self.current().to_string();
            self.report(start);
            return Ok(());
        };

        let position = match target.parse::<i64>() {
            Ok(index) => usize::try_from(index)
                .ok()
                .filter(|i| *i < self.package.spine.len()),
            Err(_) => self.package.spine_index(target),
        }
        .ok_or_else(|| AppError::Engine(format!("Unknown location {}", target)))?;

        self.position = position;
        self.report(target.to_string());
        Ok(())
    }

    fn prev(&mut self) -> Result<()> {
        self.move_to(self.position.saturating_sub(1));
        Ok(())
    }

    fn next(&mut self) -> Result<()> {
        let last = self.package.spine.len() - 1;
        self.move_to((self.position + 1).min(last));
        Ok(())
    }

    fn subscribe(&mut self, kind: EventKind) {
        self.subscribed.insert(kind);
    }

    fn take_events(&mut self) -> Vec<RenditionEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Find the OPF file path from container.xml.
fn find_opf_path(archive: &mut Archive) -> Result<String> {
    let content = read_member(archive, "META-INF/container.xml")?;
    let doc = Document::parse(&content)?;

    doc.descendants()
        .find(|n| n.has_tag_name("rootfile"))
        .and_then(|n| n.attribute("full-path"))
        .map(String::from)
        .ok_or_else(|| AppError::InvalidFormat("No rootfile in container.xml".into()))
}

fn read_member(archive: &mut Archive, name: &str) -> Result<String> {
    let mut file = archive.by_name(name)?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(content)
}

/// XHTML navigation documents usually carry a doctype.
fn parse_xhtml(content: &str) -> Result<Document<'_>> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Ok(Document::parse_with_options(content, options)?)
}

fn parse_nav_document(content: &str, base_dir: &str, opf_dir: &str) -> Result<Vec<NavItem>> {
    let doc = parse_xhtml(content)?;
    let navs: Vec<Node> = doc.descendants().filter(|n| n.has_tag_name("nav")).collect();
    let nav = navs
        .iter()
        .find(|n| n.attribute((OPS_NS, "type")) == Some("toc"))
        .or_else(|| navs.first());

    let Some(list) = nav.and_then(|n| n.children().find(|c| c.has_tag_name("ol"))) else {
        return Ok(Vec::new());
    };
    Ok(parse_nav_list(list, base_dir, opf_dir))
}

fn parse_nav_list(list: Node, base_dir: &str, opf_dir: &str) -> Vec<NavItem> {
    list.children()
        .filter(|n| n.has_tag_name("li"))
        .filter_map(|li| {
            let target = li
                .children()
                .find(|c| c.has_tag_name("a") || c.has_tag_name("span"))?;
            let href = target
                .attribute("href")
                .map(|href| opf_relative(base_dir, href, opf_dir))
                .unwrap_or_default();
            let subitems = li
                .children()
                .find(|c| c.has_tag_name("ol"))
                .map(|ol| parse_nav_list(ol, base_dir, opf_dir))
                .unwrap_or_default();

            Some(NavItem {
                id: li.attribute("id").unwrap_or_default().to_string(),
                label: node_text(target),
                href,
                subitems,
            })
        })
        .collect()
}

fn parse_ncx(content: &str, base_dir: &str, opf_dir: &str) -> Result<Vec<NavItem>> {
    let doc = parse_xhtml(content)?;
    let Some(nav_map) = doc.descendants().find(|n| n.has_tag_name("navMap")) else {
        return Ok(Vec::new());
    };
    Ok(parse_nav_points(nav_map, base_dir, opf_dir))
}

fn parse_nav_points(parent: Node, base_dir: &str, opf_dir: &str) -> Vec<NavItem> {
    parent
        .children()
        .filter(|n| n.has_tag_name("navPoint"))
        .map(|point| {
            let label = point
                .children()
                .find(|c| c.has_tag_name("navLabel"))
                .map(node_text)
                .unwrap_or_default();
            let href = point
                .children()
                .find(|c| c.has_tag_name("content"))
                .and_then(|c| c.attribute("src"))
                .map(|src| opf_relative(base_dir, src, opf_dir))
                .unwrap_or_default();

            NavItem {
                id: point.attribute("id").unwrap_or_default().to_string(),
                label,
                href,
                subitems: parse_nav_points(point, base_dir, opf_dir),
            }
        })
        .collect()
}

fn node_text(node: Node) -> String {
    let text: Vec<&str> = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .flat_map(str::split_whitespace)
        .collect();
    text.join(" ")
}

fn strip_fragment(href: &str) -> &str {
    href.split_once('#').map(|(path, _)| path).unwrap_or(href)
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

fn decode_href(href: &str) -> String {
    urlencoding::decode(href)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| href.to_string())
}

/// Join an archive directory and a relative path, resolving `.` and `..`.
fn join_path(dir: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = dir.split('/').filter(|p| !p.is_empty()).collect();
    for part in relative.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Resolve an href found in a document under `base_dir` to one relative to
/// the OPF directory, keeping its fragment.
fn opf_relative(base_dir: &str, href: &str, opf_dir: &str) -> String {
    let (path, fragment) = match href.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (href, None),
    };
    let full = join_path(base_dir, &decode_href(path));
    let relative = if opf_dir.is_empty() {
        full.as_str()
    } else {
        full.strip_prefix(opf_dir)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(&full)
    };

    match fragment {
        Some(fragment) => format!("{}#{}", relative, fragment),
        None => relative.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const CONTAINER: &str = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#;

    const OPF_NAV: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>A Test Book</dc:title>
  </metadata>
  <manifest>
    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="c1" href="text/chapter%201.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="text/ch2.xhtml" media-type="application/xhtml+xml"/>
    <item id="c3" href="text/ch3.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine>
    <itemref idref="c1"/>
    <itemref idref="c2"/>
    <itemref idref="c3"/>
  </spine>
</package>"#;

    const NAV: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<body>
  <nav epub:type="landmarks"><ol><li><a href="text/ch3.xhtml">Landmark</a></li></ol></nav>
  <nav epub:type="toc">
    <ol>
      <li id="p1"><span>Part <em>One</em></span>
        <ol>
          <li><a href="text/chapter%201.xhtml">Chapter 1</a></li>
          <li><a href="text/ch2.xhtml#scene">Chapter 2</a></li>
        </ol>
      </li>
      <li><a href="text/ch3.xhtml">Chapter 3</a></li>
    </ol>
  </nav>
</body>
</html>"#;

    const OPF_NCX: &str = r#"<?xml version="1.0"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Old Book</dc:title></metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="c1" href="ch1.html" media-type="application/xhtml+xml"/>
    <item id="c2" href="ch2.html" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx"><itemref idref="c1"/><itemref idref="c2"/></spine>
</package>"#;

    const NCX: &str = r#"<?xml version="1.0"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
    <navPoint id="np1"><navLabel><text>One</text></navLabel><content src="ch1.html"/>
      <navPoint id="np2"><navLabel><text>One point one</text></navLabel><content src="ch1.html#s1"/></navPoint>
    </navPoint>
    <navPoint id="np3"><navLabel><text>Two</text></navLabel><content src="ch2.html"/></navPoint>
  </navMap>
</ncx>"#;

    fn build(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    /// Small EPUB 3 book with a nested nav document.
    pub(crate) fn sample_epub() -> Vec<u8> {
        build(&[
            ("mimetype", "application/epub+zip"),
            ("META-INF/container.xml", CONTAINER),
            ("OEBPS/content.opf", OPF_NAV),
            ("OEBPS/nav.xhtml", NAV),
            ("OEBPS/text/chapter 1.xhtml", "<html><body><p>One</p></body></html>"),
            ("OEBPS/text/ch2.xhtml", "<html><body><p>Two</p></body></html>"),
            ("OEBPS/text/ch3.xhtml", "<html><body><p>Three</p></body></html>"),
        ])
    }

    fn ncx_epub() -> Vec<u8> {
        let container = CONTAINER.replace("OEBPS/content.opf", "content.opf");
        build(&[
            ("META-INF/container.xml", container.as_str()),
            ("content.opf", OPF_NCX),
            ("toc.ncx", NCX),
            ("ch1.html", "<html/>"),
            ("ch2.html", "<html/>"),
        ])
    }

    fn engine(data: Vec<u8>) -> ArchiveEngine {
        ArchiveEngineFactory::new()
            .construct(&BookSource::from(data), &BookOptions::default())
            .unwrap()
    }

    fn navigation(engine: &mut ArchiveEngine) -> Navigation {
        match engine.poll_navigation() {
            Poll::Ready(result) => result.unwrap(),
            Poll::Pending => panic!("navigation pending"),
        }
    }

    #[test]
    fn test_nav_document_toc() {
        let mut engine = engine(sample_epub());
        let toc = navigation(&mut engine).toc;

        assert_eq!(engine.title(), Some("A Test Book"));
        assert_eq!(toc.len(), 2);
        assert_eq!(toc[0].label, "Part One");
        assert_eq!(toc[0].id, "p1");
        assert_eq!(toc[0].href, "");
        assert_eq!(toc[0].subitems[0].href, "text/chapter 1.xhtml");
        assert_eq!(toc[0].subitems[1].href, "text/ch2.xhtml#scene");
        assert_eq!(toc[1].label, "Chapter 3");
    }

    #[test]
    fn test_ncx_toc() {
        let package = EpubPackage::parse(Arc::from(ncx_epub())).unwrap();
        assert_eq!(package.title.as_deref(), Some("Old Book"));
        assert_eq!(package.opf_dir, "");
        assert_eq!(package.spine, vec!["ch1.html", "ch2.html"]);
        assert_eq!(package.toc[0].label, "One");
        assert_eq!(package.toc[0].subitems[0].href, "ch1.html#s1");
        assert_eq!(package.toc[1].id, "np3");
    }

    #[test]
    fn test_display_and_paging() {
        let mut engine = engine(sample_epub());
        navigation(&mut engine);
        let mut rendition = engine
            .render_to("viewer", &RenditionOptions::default())
            .unwrap();
        rendition.subscribe(EventKind::LocationChanged);

        rendition.display(Some("text/ch2.xhtml#scene")).unwrap();
        assert_eq!(rendition.position(), 1);
        rendition.display(Some("2")).unwrap();
        assert_eq!(rendition.current(), "text/ch3.xhtml");
        assert!(rendition.display(Some("7")).is_err());
        assert!(rendition.display(Some("nowhere.xhtml")).is_err());

        rendition.next().unwrap();
        assert_eq!(rendition.position(), 2);
        rendition.prev().unwrap();

        let starts: Vec<String> = rendition
            .take_events()
            .into_iter()
            .map(|e| match e {
                RenditionEvent::LocationChanged(report) => report.start,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(starts, vec!["text/ch2.xhtml#scene", "2", "text/ch2.xhtml"]);
        assert!(rendition.take_events().is_empty());
    }

    #[test]
    fn test_unsubscribed_events_are_not_queued() {
        let mut engine = engine(sample_epub());
        let mut rendition = engine
            .render_to("viewer", &RenditionOptions::default())
            .unwrap();
        rendition.next().unwrap();
        assert!(rendition.take_events().is_empty());
    }

    #[test]
    fn test_resource_lookup() {
        let mut engine = engine(sample_epub());
        let body = engine.resource("text/chapter 1.xhtml#top").unwrap();
        assert!(String::from_utf8(body).unwrap().contains("One"));
        assert!(matches!(
            engine.resource("text/missing.xhtml"),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_destroyed_engine_fails() {
        let mut engine = engine(sample_epub());
        engine.destroy();
        assert!(matches!(engine.poll_navigation(), Poll::Ready(Err(_))));
    }

    #[test]
    fn test_rejects_directory_and_garbage() {
        let mut factory = ArchiveEngineFactory::new();
        let options = BookOptions {
            open_as: Some(OpenAs::Directory),
        };
        assert!(
            factory
                .construct(&BookSource::from(sample_epub()), &options)
                .is_err()
        );
        assert!(
            factory
                .construct(&BookSource::from(b"not a zip".to_vec()), &BookOptions::default())
                .is_err()
        );
        assert!(
            factory
                .construct(&BookSource::Url("/blobs/a.epub".into()), &BookOptions::default())
                .is_err()
        );
    }

    #[test]
    fn test_open_as_must_match_source() {
        let mut factory = ArchiveEngineFactory::new();
        let url = BookSource::Url("/blobs/a.epub".into());
        let binary = BookOptions {
            open_as: Some(OpenAs::Binary),
        };
        assert!(matches!(
            factory.construct(&url, &binary),
            Err(AppError::InvalidFormat(_))
        ));

        let data = BookSource::from(sample_epub());
        let mut engine = factory
            .construct(&data, &BookOptions::for_source(&data))
            .unwrap();
        assert!(matches!(engine.poll_navigation(), Poll::Ready(Ok(_))));
        assert_eq!(
            BookOptions::for_source(&url).open_as,
            Some(OpenAs::Epub)
        );
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("OEBPS/text", "../images/a.png"), "OEBPS/images/a.png");
        assert_eq!(join_path("", "./ch1.xhtml"), "ch1.xhtml");
        assert_eq!(opf_relative("OEBPS", "text/a.xhtml#x", "OEBPS"), "text/a.xhtml#x");
    }
}
