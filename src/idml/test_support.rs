//! In-memory IDML packages for tests.

use crate::idml::core::package::MIME_TYPE;
use std::collections::BTreeSet;
use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

const PACKAGING_NS: &str = "http://ns.adobe.com/AdobeInDesign/idml/1.0/packaging";
const ACTIVE_LAYER: &str = "ub3";

pub const STYLES_PART: &str = "Resources/Styles.xml";
pub const PREFERENCES_PART: &str = "Resources/Preferences.xml";

pub const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<idPkg:Styles xmlns:idPkg="http://ns.adobe.com/AdobeInDesign/idml/1.0/packaging" DOMVersion="16.0">
	<RootCharacterStyleGroup Self="u79">
		<CharacterStyle Self="CharacterStyle/$ID/[No character style]" Name="$ID/[No character style]"/>
	</RootCharacterStyleGroup>
	<RootParagraphStyleGroup Self="u78">
		<ParagraphStyle Self="ParagraphStyle/$ID/NormalParagraphStyle" Name="$ID/NormalParagraphStyle">
			<Properties><AppliedFont type="string">Minion Pro</AppliedFont></Properties>
		</ParagraphStyle>
	</RootParagraphStyleGroup>
	<RootCellStyleGroup Self="u8a"/>
	<RootTableStyleGroup Self="u8c"/>
	<RootObjectStyleGroup Self="u97"/>
</idPkg:Styles>
"#;

/// A text frame placed on a spread.
#[derive(Debug, Clone)]
pub struct Frame {
    story_id: String,
    x: f64,
    y: f64,
    layer: Option<String>,
    visible: bool,
}

impl Frame {
    pub fn on_layer(mut self, layer: &str) -> Self {
        self.layer = Some(layer.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    fn to_xml(&self) -> String {
        let mut xml = format!(
            r#"<TextFrame Self="f{id}" ParentStory="{id}" PreviousTextFrame="n" NextTextFrame="n" ItemTransform="1 0 0 1 {x} {y}""#,
            id = self.story_id,
            x = self.x,
            y = self.y
        );
        if let Some(layer) = &self.layer {
            xml.push_str(&format!(r#" ItemLayer="{}""#, layer));
        }
        if !self.visible {
            xml.push_str(r#" Visible="false""#);
        }
        xml.push_str("/>");
        xml
    }
}

/// A frame for `story_id` translated to `(x, y)`, without explicit geometry.
pub fn text_frame(story_id: &str, x: f64, y: f64) -> Frame {
    Frame {
        story_id: story_id.to_string(),
        x,
        y,
        layer: None,
        visible: true,
    }
}

/// A story part holding one paragraph of plain text.
pub fn story(text: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<idPkg:Story xmlns:idPkg="{PACKAGING_NS}" DOMVersion="16.0"><Story Self="s"><StoryPreference OpticalMarginAlignment="false"/><ParagraphStyleRange AppliedParagraphStyle="ParagraphStyle/$ID/NormalParagraphStyle"><CharacterStyleRange AppliedCharacterStyle="CharacterStyle/$ID/[No character style]"><Content>{text}</Content></CharacterStyleRange></ParagraphStyleRange></Story></idPkg:Story>
"#
    )
}

fn spread_xml(root: &str, id: &str, frames: &[Frame]) -> String {
    let items: String = frames.iter().map(Frame::to_xml).collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<idPkg:{root} xmlns:idPkg="{PACKAGING_NS}" DOMVersion="16.0"><{root} Self="{id}" ItemTransform="1 0 0 1 0 0">{items}</{root}></idPkg:{root}>
"#
    )
}

/// Builds a package whose design map lists every added part.
#[derive(Debug, Clone)]
pub struct PackageBuilder {
    mimetype: String,
    layers: Vec<(String, bool)>,
    master_spreads: Vec<(String, String)>,
    spreads: Vec<(String, String)>,
    stories: Vec<(String, String)>,
    extra: Vec<(String, Vec<u8>)>,
    omitted: BTreeSet<String>,
}

impl PackageBuilder {
    /// Mimetype, design map, container, styles and preferences.
    pub fn minimal() -> Self {
        Self {
            mimetype: MIME_TYPE.to_string(),
            layers: vec![(ACTIVE_LAYER.to_string(), true)],
            master_spreads: Vec::new(),
            spreads: Vec::new(),
            stories: Vec::new(),
            extra: Vec::new(),
            omitted: BTreeSet::new(),
        }
    }

    pub fn mimetype(mut self, mimetype: &str) -> Self {
        self.mimetype = mimetype.to_string();
        self
    }

    pub fn layer(mut self, id: &str, visible: bool) -> Self {
        self.layers.push((id.to_string(), visible));
        self
    }

    pub fn master_spread(mut self, name: &str, frames: &[Frame]) -> Self {
        let id = format!("m{}", self.master_spreads.len() + 1);
        self.master_spreads.push((name.to_string(), spread_xml("MasterSpread", &id, frames)));
        self
    }

    pub fn spread(mut self, name: &str, frames: &[Frame]) -> Self {
        let id = format!("s{}", self.spreads.len() + 1);
        self.spreads.push((name.to_string(), spread_xml("Spread", &id, frames)));
        self
    }

    /// Add `Stories/Story_<id>.xml` with the given content.
    pub fn story(mut self, id: &str, xml: &str) -> Self {
        self.stories.push((format!("Stories/Story_{}.xml", id), xml.to_string()));
        self
    }

    /// An entry the design map does not know about.
    pub fn entry(mut self, name: &str, bytes: &[u8]) -> Self {
        self.extra.push((name.to_string(), bytes.to_vec()));
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.omitted.insert(name.to_string());
        self
    }

    fn design_map(&self) -> String {
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Document xmlns:idPkg="{PACKAGING_NS}" DOMVersion="16.0" Self="d" ActiveLayer="{ACTIVE_LAYER}">
	<idPkg:Styles src="{STYLES_PART}"/>
	<idPkg:Preferences src="{PREFERENCES_PART}"/>
"#
        );
        for (id, visible) in &self.layers {
            xml.push_str(&format!("\t<Layer Self=\"{}\" Name=\"{}\" Visible=\"{}\"/>\n", id, id, visible));
        }
        for (name, _) in &self.master_spreads {
            xml.push_str(&format!("\t<idPkg:MasterSpread src=\"{}\"/>\n", name));
        }
        for (name, _) in &self.spreads {
            xml.push_str(&format!("\t<idPkg:Spread src=\"{}\"/>\n", name));
        }
        for (name, _) in &self.stories {
            xml.push_str(&format!("\t<idPkg:Story src=\"{}\"/>\n", name));
        }
        xml.push_str("</Document>\n");
        xml
    }

    pub fn build(self) -> Vec<u8> {
        let preferences = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<idPkg:Preferences xmlns:idPkg="{PACKAGING_NS}" DOMVersion="16.0"><StoryPreference OpticalMarginAlignment="false" StoryDirection="LeftToRightDirection"/></idPkg:Preferences>
"#
        );
        let container = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container"><rootfiles><rootfile full-path="designmap.xml" media-type="text/xml"/></rootfiles></container>
"#;

        let mut entries: Vec<(String, Vec<u8>)> = vec![
            ("designmap.xml".to_string(), self.design_map().into_bytes()),
            ("META-INF/container.xml".to_string(), container.as_bytes().to_vec()),
            (STYLES_PART.to_string(), STYLES_XML.as_bytes().to_vec()),
            (PREFERENCES_PART.to_string(), preferences.into_bytes()),
        ];
        for (name, xml) in self.master_spreads.iter().chain(&self.spreads).chain(&self.stories) {
            entries.push((name.clone(), xml.as_bytes().to_vec()));
        }
        entries.extend(self.extra.iter().cloned());

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        if !self.omitted.contains("mimetype") {
            zip.start_file("mimetype", stored).unwrap();
            zip.write_all(self.mimetype.as_bytes()).unwrap();
        }
        for (name, bytes) in entries.iter().filter(|(name, _)| !self.omitted.contains(name)) {
            zip.start_file(name.as_str(), deflated).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}
