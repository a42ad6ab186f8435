//! Minimal PresentationML (`.pptx`) writer.
//!
//! A `.pptx` file is a zip of XML parts wired together by relationship files.
//! This writer produces exactly what a narrated image deck needs:
//!
//! ```text
//! [Content_Types].xml
//! _rels/.rels
//! docProps/{core,app}.xml
//! ppt/presentation.xml            + _rels
//! ppt/slideMasters/slideMaster1   + _rels   (blank, theme1)
//! ppt/slideLayouts/slideLayout1   + _rels   (blank)
//! ppt/notesMasters/notesMaster1   + _rels   (theme2)
//! ppt/theme/theme{1,2}.xml
//! ppt/slides/slideN.xml           + _rels   (layout, image, notes slide)
//! ppt/notesSlides/notesSlideN.xml + _rels   (notes master, slide)
//! ppt/media/imageN.{jpeg,png}
//! ```
//!
//! Each slide carries at most one picture and no text. Narration lives only
//! in the notes slide.

pub mod xml;

use chrono::{DateTime, Utc};
use std::io::{Cursor, Seek, Write};
use std::sync::Arc;
use zip::result::ZipResult;
use zip::write::{SimpleFileOptions, ZipWriter};

pub use xml::escape_xml;

/// English Metric Units per inch.
pub const EMU_PER_INCH: i64 = 914_400;

/// 16:9 slide width (10 in).
pub const SLIDE_WIDTH_16X9: i64 = 9_144_000;

/// 16:9 slide height (5.625 in).
pub const SLIDE_HEIGHT_16X9: i64 = 5_143_500;

/// Relationship id of the picture inside a slide's `.rels`.
pub(crate) const SLIDE_IMAGE_REL: &str = "rId3";

const SLIDE_MASTER_XML: &str = include_str!("resources/slideMaster1.xml");
const SLIDE_LAYOUT_XML: &str = include_str!("resources/slideLayout1.xml");
const NOTES_MASTER_XML: &str = include_str!("resources/notesMaster1.xml");
const THEME_XML: &str = include_str!("resources/theme.xml");
const PRES_PROPS_XML: &str = include_str!("resources/presProps.xml");
const VIEW_PROPS_XML: &str = include_str!("resources/viewProps.xml");
const TABLE_STYLES_XML: &str = include_str!("resources/tableStyles.xml");

/// Position and size of a shape, in EMU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub cx: i64,
    pub cy: i64,
}

/// An embedded image and where it sits on the slide.
#[derive(Debug, Clone)]
pub struct Picture {
    pub data: Arc<[u8]>,
    /// Media file extension, `jpeg` or `png`.
    pub extension: &'static str,
    pub placement: Placement,
}

/// One slide: an optional picture plus presenter notes.
#[derive(Debug, Clone)]
pub struct SlidePart {
    /// Slide name and picture description. Never rendered on the slide.
    pub name: String,
    pub picture: Option<Picture>,
    pub notes: String,
}

/// An in-memory presentation ready to be zipped.
#[derive(Debug, Clone)]
pub struct PresentationPackage {
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) slide_width: i64,
    pub(crate) slide_height: i64,
    pub(crate) created: DateTime<Utc>,
    pub(crate) slides: Vec<SlidePart>,
}

impl PresentationPackage {
    /// Empty 16:9 presentation.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            slide_width: SLIDE_WIDTH_16X9,
            slide_height: SLIDE_HEIGHT_16X9,
            created: Utc::now(),
            slides: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = created;
        self
    }

    /// Slide size in EMU as `(width, height)`.
    pub fn slide_size(&self) -> (i64, i64) {
        (self.slide_width, self.slide_height)
    }

    pub fn add_slide(&mut self, slide: SlidePart) {
        self.slides.push(slide);
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub(crate) fn is_16x9(&self) -> bool {
        self.slide_width * 9 == self.slide_height * 16
    }

    /// Serialise the package to a `.pptx` byte buffer.
    pub fn to_bytes(&self) -> ZipResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Serialise the package into any seekable writer.
    pub fn write_to<W: Write + Seek>(&self, writer: W) -> ZipResult<()> {
        let mut zip = ZipWriter::new(writer);
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        // Media is already compressed.
        let stored =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

        put(&mut zip, "[Content_Types].xml", xml::content_types(self).as_bytes(), options)?;
        put(&mut zip, "_rels/.rels", self.package_rels().as_bytes(), options)?;
        put(&mut zip, "docProps/core.xml", xml::core_properties(self).as_bytes(), options)?;
        put(&mut zip, "docProps/app.xml", xml::app_properties(self).as_bytes(), options)?;

        put(&mut zip, "ppt/presentation.xml", xml::presentation(self).as_bytes(), options)?;
        put(
            &mut zip,
            "ppt/_rels/presentation.xml.rels",
            self.presentation_rels().as_bytes(),
            options,
        )?;
        put(&mut zip, "ppt/presProps.xml", PRES_PROPS_XML.as_bytes(), options)?;
        put(&mut zip, "ppt/viewProps.xml", VIEW_PROPS_XML.as_bytes(), options)?;
        put(&mut zip, "ppt/tableStyles.xml", TABLE_STYLES_XML.as_bytes(), options)?;

        put(
            &mut zip,
            "ppt/slideMasters/slideMaster1.xml",
            SLIDE_MASTER_XML.as_bytes(),
            options,
        )?;
        put(
            &mut zip,
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            xml::relationships(&[
                rel(1, xml::rel::SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml"),
                rel(2, xml::rel::THEME, "../theme/theme1.xml"),
            ])
            .as_bytes(),
            options,
        )?;
        put(
            &mut zip,
            "ppt/slideLayouts/slideLayout1.xml",
            SLIDE_LAYOUT_XML.as_bytes(),
            options,
        )?;
        put(
            &mut zip,
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            xml::relationships(&[rel(
                1,
                xml::rel::SLIDE_MASTER,
                "../slideMasters/slideMaster1.xml",
            )])
            .as_bytes(),
            options,
        )?;
        put(
            &mut zip,
            "ppt/notesMasters/notesMaster1.xml",
            NOTES_MASTER_XML.as_bytes(),
            options,
        )?;
        put(
            &mut zip,
            "ppt/notesMasters/_rels/notesMaster1.xml.rels",
            xml::relationships(&[rel(1, xml::rel::THEME, "../theme/theme2.xml")]).as_bytes(),
            options,
        )?;
        put(&mut zip, "ppt/theme/theme1.xml", THEME_XML.as_bytes(), options)?;
        put(&mut zip, "ppt/theme/theme2.xml", THEME_XML.as_bytes(), options)?;

        for (i, slide) in self.slides.iter().enumerate() {
            let n = i + 1;

            put(
                &mut zip,
                &format!("ppt/slides/slide{n}.xml"),
                xml::slide(slide, n).as_bytes(),
                options,
            )?;

            let mut slide_rels = vec![
                rel(1, xml::rel::SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml"),
                rel(
                    2,
                    xml::rel::NOTES_SLIDE,
                    &format!("../notesSlides/notesSlide{n}.xml"),
                ),
            ];
            if let Some(pic) = &slide.picture {
                let media = format!("image{n}.{}", pic.extension);
                slide_rels.push((
                    SLIDE_IMAGE_REL.to_string(),
                    xml::rel::IMAGE,
                    format!("../media/{media}"),
                ));
                put(&mut zip, &format!("ppt/media/{media}"), &pic.data, stored)?;
            }
            put(
                &mut zip,
                &format!("ppt/slides/_rels/slide{n}.xml.rels"),
                xml::relationships(&slide_rels).as_bytes(),
                options,
            )?;

            put(
                &mut zip,
                &format!("ppt/notesSlides/notesSlide{n}.xml"),
                xml::notes_slide(&slide.notes).as_bytes(),
                options,
            )?;
            put(
                &mut zip,
                &format!("ppt/notesSlides/_rels/notesSlide{n}.xml.rels"),
                xml::relationships(&[
                    rel(1, xml::rel::NOTES_MASTER, "../notesMasters/notesMaster1.xml"),
                    rel(2, xml::rel::SLIDE, &format!("../slides/slide{n}.xml")),
                ])
                .as_bytes(),
                options,
            )?;
        }

        zip.finish()?;
        Ok(())
    }

    fn package_rels(&self) -> String {
        xml::relationships(&[
            rel(1, xml::rel::OFFICE_DOCUMENT, "ppt/presentation.xml"),
            rel(2, xml::rel::CORE_PROPS, "docProps/core.xml"),
            rel(3, xml::rel::EXTENDED_PROPS, "docProps/app.xml"),
        ])
    }

    fn presentation_rels(&self) -> String {
        let mut rels = vec![
            rel(1, xml::rel::SLIDE_MASTER, "slideMasters/slideMaster1.xml"),
            rel(2, xml::rel::THEME, "theme/theme1.xml"),
            rel(3, xml::rel::NOTES_MASTER, "notesMasters/notesMaster1.xml"),
            rel(4, xml::rel::PRES_PROPS, "presProps.xml"),
            rel(5, xml::rel::VIEW_PROPS, "viewProps.xml"),
            rel(6, xml::rel::TABLE_STYLES, "tableStyles.xml"),
        ];
        debug_assert_eq!(rels.len(), xml::PRESENTATION_FIXED_RELS);
        for i in 0..self.slides.len() {
            rels.push(rel(
                xml::PRESENTATION_FIXED_RELS + 1 + i,
                xml::rel::SLIDE,
                &format!("slides/slide{}.xml", i + 1),
            ));
        }
        xml::relationships(&rels)
    }
}

fn put<W: Write + Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    body: &[u8],
    options: SimpleFileOptions,
) -> ZipResult<()> {
    zip.start_file(name, options)?;
    zip.write_all(body)?;
    Ok(())
}

fn rel(id: usize, rel_type: &'static str, target: &str) -> (String, &'static str, String) {
    (format!("rId{id}"), rel_type, target.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn sample() -> PresentationPackage {
        let mut pkg = PresentationPackage::new("Quarterly <Review>").with_description("Numbers");
        pkg.add_slide(SlidePart {
            name: "Intro".into(),
            picture: Some(Picture {
                data: Arc::from(vec![0xFF, 0xD8, 0xFF, 0xD9]),
                extension: "jpeg",
                placement: Placement {
                    x: 0,
                    y: 0,
                    cx: SLIDE_WIDTH_16X9,
                    cy: SLIDE_HEIGHT_16X9,
                },
            }),
            notes: "Hello & welcome".into(),
        });
        pkg.add_slide(SlidePart {
            name: "No picture".into(),
            picture: None,
            notes: "Only notes".into(),
        });
        pkg
    }

    fn read(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut s = String::new();
        archive
            .by_name(name)
            .unwrap_or_else(|_| panic!("missing part {name}"))
            .read_to_string(&mut s)
            .unwrap();
        s
    }

    #[test]
    fn package_contains_every_part() {
        let bytes = sample().to_bytes().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        for name in [
            "[Content_Types].xml",
            "_rels/.rels",
            "docProps/core.xml",
            "docProps/app.xml",
            "ppt/presentation.xml",
            "ppt/_rels/presentation.xml.rels",
            "ppt/slideMasters/slideMaster1.xml",
            "ppt/slideLayouts/slideLayout1.xml",
            "ppt/notesMasters/notesMaster1.xml",
            "ppt/theme/theme1.xml",
            "ppt/theme/theme2.xml",
            "ppt/slides/slide1.xml",
            "ppt/slides/slide2.xml",
            "ppt/notesSlides/notesSlide1.xml",
            "ppt/notesSlides/notesSlide2.xml",
            "ppt/media/image1.jpeg",
        ] {
            assert!(archive.by_name(name).is_ok(), "missing {name}");
        }
        assert!(archive.by_name("ppt/media/image2.jpeg").is_err());
    }

    #[test]
    fn presentation_is_16x9_with_two_slides() {
        let bytes = sample().to_bytes().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let pres = read(&mut archive, "ppt/presentation.xml");
        assert!(pres.contains(r#"<p:sldSz cx="9144000" cy="5143500" type="screen16x9"/>"#));
        assert!(pres.contains(r#"<p:sldId id="256" r:id="rId7"/>"#));
        assert!(pres.contains(r#"<p:sldId id="257" r:id="rId8"/>"#));

        let rels = read(&mut archive, "ppt/_rels/presentation.xml.rels");
        assert!(rels.contains(r#"Id="rId8""#) && rels.contains("slides/slide2.xml"));
    }

    #[test]
    fn slide_parts_are_wired() {
        let bytes = sample().to_bytes().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();

        let slide1 = read(&mut archive, "ppt/slides/slide1.xml");
        assert!(slide1.contains(r#"<a:blip r:embed="rId3"/>"#));
        assert!(!slide1.contains("<a:t>"));
        let rels1 = read(&mut archive, "ppt/slides/_rels/slide1.xml.rels");
        assert!(rels1.contains("../media/image1.jpeg"));
        assert!(rels1.contains("../notesSlides/notesSlide1.xml"));

        let slide2 = read(&mut archive, "ppt/slides/slide2.xml");
        assert!(!slide2.contains("<p:pic>"));

        let notes = read(&mut archive, "ppt/notesSlides/notesSlide1.xml");
        assert!(notes.contains("Hello &amp; welcome"));

        let core = read(&mut archive, "docProps/core.xml");
        assert!(core.contains("<dc:title>Quarterly &lt;Review&gt;</dc:title>"));
        assert!(core.contains("<dc:description>Numbers</dc:description>"));
    }

    #[test]
    fn media_is_stored_verbatim() {
        let bytes = sample().to_bytes().unwrap();
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut media = Vec::new();
        archive
            .by_name("ppt/media/image1.jpeg")
            .unwrap()
            .read_to_end(&mut media)
            .unwrap();
        assert_eq!(media, vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }
}
