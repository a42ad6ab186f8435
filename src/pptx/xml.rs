//! XML part generators for the presentation package.
//!
//! Parts that never vary live as resource files next to this module; the
//! ones that depend on slide count, titles or notes are built here.

use super::{PresentationPackage, SlidePart};
use chrono::SecondsFormat;

pub(crate) const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
pub(crate) const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(crate) const NS_R: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Relationship type URIs used by the package.
pub(crate) mod rel {
    pub const OFFICE_DOCUMENT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    pub const CORE_PROPS: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
    pub const EXTENDED_PROPS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
    pub const SLIDE_MASTER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
    pub const SLIDE_LAYOUT: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
    pub const SLIDE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
    pub const NOTES_MASTER: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesMaster";
    pub const NOTES_SLIDE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";
    pub const THEME: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
    pub const IMAGE: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
    pub const PRES_PROPS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/presProps";
    pub const VIEW_PROPS: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/viewProps";
    pub const TABLE_STYLES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/tableStyles";
}

const CT_PRESENTATION: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";
const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
const CT_NOTES_SLIDE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.notesSlide+xml";

/// Fixed relationship ids in `ppt/_rels/presentation.xml.rels`. Slides follow.
pub(crate) const PRESENTATION_FIXED_RELS: usize = 6;

/// Escape the five XML special characters.
pub fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Not representable in XML 1.0.
            c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
            c => out.push(c),
        }
    }
    out
}

/// A `.rels` part from `(id, type, target)` triples.
pub(crate) fn relationships(rels: &[(String, &str, String)]) -> String {
    let mut xml = String::with_capacity(256 + rels.len() * 160);
    xml.push_str(XML_DECL);
    xml.push_str(&format!(r#"<Relationships xmlns="{NS_PKG_RELS}">"#));
    for (id, rel_type, target) in rels {
        xml.push_str(&format!(
            r#"<Relationship Id="{id}" Type="{rel_type}" Target="{target}"/>"#
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

pub(crate) fn content_types(pkg: &PresentationPackage) -> String {
    let mut xml = String::with_capacity(2048 + pkg.slides.len() * 300);
    xml.push_str(XML_DECL);
    xml.push_str(
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    );
    xml.push_str(r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#);
    xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    xml.push_str(r#"<Default Extension="jpeg" ContentType="image/jpeg"/>"#);
    xml.push_str(r#"<Default Extension="png" ContentType="image/png"/>"#);

    let fixed = [
        ("/ppt/presentation.xml", CT_PRESENTATION),
        (
            "/ppt/slideMasters/slideMaster1.xml",
            "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml",
        ),
        (
            "/ppt/slideLayouts/slideLayout1.xml",
            "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml",
        ),
        (
            "/ppt/notesMasters/notesMaster1.xml",
            "application/vnd.openxmlformats-officedocument.presentationml.notesMaster+xml",
        ),
        (
            "/ppt/theme/theme1.xml",
            "application/vnd.openxmlformats-officedocument.theme+xml",
        ),
        (
            "/ppt/theme/theme2.xml",
            "application/vnd.openxmlformats-officedocument.theme+xml",
        ),
        (
            "/ppt/presProps.xml",
            "application/vnd.openxmlformats-officedocument.presentationml.presProps+xml",
        ),
        (
            "/ppt/viewProps.xml",
            "application/vnd.openxmlformats-officedocument.presentationml.viewProps+xml",
        ),
        (
            "/ppt/tableStyles.xml",
            "application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml",
        ),
        (
            "/docProps/core.xml",
            "application/vnd.openxmlformats-package.core-properties+xml",
        ),
        (
            "/docProps/app.xml",
            "application/vnd.openxmlformats-officedocument.extended-properties+xml",
        ),
    ];
    for (part, ct) in fixed {
        xml.push_str(&format!(r#"<Override PartName="{part}" ContentType="{ct}"/>"#));
    }

    for n in 1..=pkg.slides.len() {
        xml.push_str(&format!(
            r#"<Override PartName="/ppt/slides/slide{n}.xml" ContentType="{CT_SLIDE}"/>"#
        ));
        xml.push_str(&format!(
            r#"<Override PartName="/ppt/notesSlides/notesSlide{n}.xml" ContentType="{CT_NOTES_SLIDE}"/>"#
        ));
    }

    xml.push_str("</Types>");
    xml
}

pub(crate) fn presentation(pkg: &PresentationPackage) -> String {
    let mut xml = String::with_capacity(1024 + pkg.slides.len() * 48);
    xml.push_str(XML_DECL);
    xml.push_str(&format!(
        r#"<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1">"#
    ));

    xml.push_str(r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#);
    xml.push_str(r#"<p:notesMasterIdLst><p:notesMasterId r:id="rId3"/></p:notesMasterIdLst>"#);

    if !pkg.slides.is_empty() {
        xml.push_str("<p:sldIdLst>");
        for i in 0..pkg.slides.len() {
            xml.push_str(&format!(
                r#"<p:sldId id="{}" r:id="rId{}"/>"#,
                256 + i,
                PRESENTATION_FIXED_RELS + 1 + i
            ));
        }
        xml.push_str("</p:sldIdLst>");
    }

    xml.push_str(&format!(
        r#"<p:sldSz cx="{}" cy="{}"{}/>"#,
        pkg.slide_width,
        pkg.slide_height,
        if pkg.is_16x9() { r#" type="screen16x9""# } else { "" }
    ));
    xml.push_str(r#"<p:notesSz cx="6858000" cy="9144000"/>"#);
    xml.push_str("</p:presentation>");
    xml
}

pub(crate) fn slide(part: &SlidePart, number: usize) -> String {
    let mut xml = String::with_capacity(1536);
    xml.push_str(XML_DECL);
    xml.push_str(&format!(
        r#"<p:sld xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}">"#
    ));
    xml.push_str(&format!(r#"<p:cSld name="{}">"#, escape_xml(&part.name)));
    xml.push_str("<p:spTree>");
    group_shape_header(&mut xml);

    if let Some(pic) = &part.picture {
        xml.push_str("<p:pic>");
        xml.push_str("<p:nvPicPr>");
        xml.push_str(&format!(
            r#"<p:cNvPr id="2" name="Page {number}" descr="{}"/>"#,
            escape_xml(&part.name)
        ));
        xml.push_str(r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr>"#);
        xml.push_str("<p:nvPr/>");
        xml.push_str("</p:nvPicPr>");
        xml.push_str("<p:blipFill>");
        xml.push_str(&format!(r#"<a:blip r:embed="{}"/>"#, super::SLIDE_IMAGE_REL));
        xml.push_str("<a:stretch><a:fillRect/></a:stretch>");
        xml.push_str("</p:blipFill>");
        xml.push_str("<p:spPr>");
        xml.push_str(&format!(
            r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
            pic.placement.x, pic.placement.y, pic.placement.cx, pic.placement.cy
        ));
        xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom>"#);
        xml.push_str("</p:spPr>");
        xml.push_str("</p:pic>");
    }

    xml.push_str("</p:spTree>");
    xml.push_str("</p:cSld>");
    xml.push_str("<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>");
    xml.push_str("</p:sld>");
    xml
}

/// Notes slide: one paragraph per line of `notes` in the body placeholder.
pub(crate) fn notes_slide(notes: &str) -> String {
    let mut xml = String::with_capacity(1024 + notes.len());
    xml.push_str(XML_DECL);
    xml.push_str(&format!(
        r#"<p:notes xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}">"#
    ));
    xml.push_str("<p:cSld>");
    xml.push_str("<p:spTree>");
    group_shape_header(&mut xml);

    xml.push_str("<p:sp>");
    xml.push_str("<p:nvSpPr>");
    xml.push_str(r#"<p:cNvPr id="2" name="Notes Placeholder 1"/>"#);
    xml.push_str(r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr>"#);
    xml.push_str(r#"<p:nvPr><p:ph type="body" idx="1"/></p:nvPr>"#);
    xml.push_str("</p:nvSpPr>");
    xml.push_str("<p:spPr/>");
    xml.push_str("<p:txBody>");
    xml.push_str("<a:bodyPr/>");
    xml.push_str("<a:lstStyle/>");
    for line in notes.lines() {
        if line.trim().is_empty() {
            xml.push_str(r#"<a:p><a:endParaRPr lang="en-US" dirty="0"/></a:p>"#);
        } else {
            xml.push_str(&format!(
                r#"<a:p><a:r><a:rPr lang="en-US" dirty="0"/><a:t>{}</a:t></a:r></a:p>"#,
                escape_xml(line)
            ));
        }
    }
    if notes.lines().next().is_none() {
        xml.push_str(r#"<a:p><a:endParaRPr lang="en-US" dirty="0"/></a:p>"#);
    }
    xml.push_str("</p:txBody>");
    xml.push_str("</p:sp>");

    xml.push_str("</p:spTree>");
    xml.push_str("</p:cSld>");
    xml.push_str("<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>");
    xml.push_str("</p:notes>");
    xml
}

pub(crate) fn core_properties(pkg: &PresentationPackage) -> String {
    let stamp = pkg.created.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut xml = String::with_capacity(1024);
    xml.push_str(XML_DECL);
    xml.push_str(r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#);
    xml.push_str(&format!("<dc:title>{}</dc:title>", escape_xml(&pkg.title)));
    if !pkg.description.is_empty() {
        xml.push_str(&format!(
            "<dc:description>{}</dc:description>",
            escape_xml(&pkg.description)
        ));
    }
    xml.push_str(&format!("<dc:creator>{}</dc:creator>", env!("CARGO_PKG_NAME")));
    xml.push_str(&format!(
        r#"<dcterms:created xsi:type="dcterms:W3CDTF">{stamp}</dcterms:created>"#
    ));
    xml.push_str(&format!(
        r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{stamp}</dcterms:modified>"#
    ));
    xml.push_str("</cp:coreProperties>");
    xml
}

pub(crate) fn app_properties(pkg: &PresentationPackage) -> String {
    let format_name = if pkg.is_16x9() {
        "On-screen Show (16:9)"
    } else {
        "Custom"
    };
    format!(
        r#"{XML_DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes"><Application>{} {}</Application><PresentationFormat>{format_name}</PresentationFormat><Slides>{n}</Slides><Notes>{n}</Notes></Properties>"#,
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        n = pkg.slides.len()
    )
}

fn group_shape_header(xml: &mut String) {
    xml.push_str("<p:nvGrpSpPr>");
    xml.push_str(r#"<p:cNvPr id="1" name=""/>"#);
    xml.push_str("<p:cNvGrpSpPr/>");
    xml.push_str("<p:nvPr/>");
    xml.push_str("</p:nvGrpSpPr>");
    xml.push_str("<p:grpSpPr>");
    xml.push_str(r#"<a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/>"#);
    xml.push_str(r#"<a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm>"#);
    xml.push_str("</p:grpSpPr>");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_special_characters() {
        assert_eq!(
            escape_xml(r#"Q3 <draft> & "final" 'ok'"#),
            "Q3 &lt;draft&gt; &amp; &quot;final&quot; &apos;ok&apos;"
        );
        assert_eq!(escape_xml("bell\u{7}\ttab"), "bell\ttab");
    }

    #[test]
    fn notes_become_paragraphs() {
        let xml = notes_slide("First line\n\nThird & last");
        assert_eq!(xml.matches("<a:p>").count(), 3);
        assert!(xml.contains("<a:t>First line</a:t>"));
        assert!(xml.contains("<a:t>Third &amp; last</a:t>"));
        assert!(xml.contains(r#"<p:ph type="body" idx="1"/>"#));
    }

    #[test]
    fn empty_notes_still_have_a_paragraph() {
        let xml = notes_slide("");
        assert_eq!(xml.matches("<a:p>").count(), 1);
    }

    #[test]
    fn relationships_part() {
        let xml = relationships(&[("rId1".into(), rel::SLIDE_LAYOUT, "../x.xml".into())]);
        assert!(xml.contains(r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../x.xml"/>"#));
    }
}
