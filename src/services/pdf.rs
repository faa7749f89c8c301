// src/services/pdf.rs

//! PDF catalog access.
//!
//! Wraps a `lopdf::Document` and exposes the two things ingestion needs per
//! page: its text and its embedded raster images, decoded to RGB.

use std::collections::BTreeMap;

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Document, Object, ObjectId, Stream};

use crate::error::{AppError, Result};
use crate::services::collage::flatten_alpha;

/// An embedded image that survived size filtering.
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Position of the image among the page's image XObjects
    pub index: usize,
    pub image: RgbImage,
}

impl PageImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Image XObject fields needed for decoding.
struct RawImage {
    id: ObjectId,
    width: i64,
    height: i64,
    filters: Vec<String>,
}

/// Filters whose payloads cannot be decoded here.
const UNSUPPORTED_FILTERS: [&str; 3] = ["JPXDecode", "JBIG2Decode", "CCITTFaxDecode"];

const MAX_COLOR_SPACE_DEPTH: usize = 8;

/// Colour spaces raw image samples can be decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette image: one index per pixel into `lookup`, whose entries are
    /// colours in `base`
    Indexed {
        base: Box<ColorSpace>,
        hival: u8,
        lookup: Vec<u8>,
    },
}

impl ColorSpace {
    /// Samples per pixel in the image data.
    pub fn components(&self) -> usize {
        match self {
            Self::Gray | Self::Indexed { .. } => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Gray => "DeviceGray",
            Self::Rgb => "DeviceRGB",
            Self::Cmyk => "DeviceCMYK",
            Self::Indexed { .. } => "Indexed",
        }
    }

    /// Resolve an image's `/ColorSpace` entry, following references.
    pub fn resolve(document: &Document, object: &Object) -> Result<Self> {
        Self::resolve_nested(document, object, 0)
    }

    fn resolve_nested(document: &Document, object: &Object, depth: usize) -> Result<Self> {
        if depth > MAX_COLOR_SPACE_DEPTH {
            return Err(AppError::image("colour space nesting too deep"));
        }
        match object {
            Object::Reference(id) => {
                Self::resolve_nested(document, document.get_object(*id)?, depth + 1)
            }
            Object::Name(name) => Self::from_family(name),
            Object::Array(items) => {
                let family = items
                    .first()
                    .and_then(|item| item.as_name().ok())
                    .ok_or_else(|| AppError::image("colour space array without a family"))?;
                match family {
                    b"ICCBased" => Self::icc_based(document, items.get(1), depth),
                    b"Indexed" | b"I" => Self::indexed(document, items, depth),
                    _ => Self::from_family(family),
                }
            }
            other => Err(AppError::image(format!(
                "unexpected colour space object {other:?}"
            ))),
        }
    }

    fn from_family(name: &[u8]) -> Result<Self> {
        match name {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(Self::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(Self::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(Self::Cmyk),
            other => Err(AppError::image(format!(
                "unsupported colour space {}",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    /// An ICC profile stream is classified by its component count, falling
    /// back to `/Alternate`.
    fn icc_based(document: &Document, profile: Option<&Object>, depth: usize) -> Result<Self> {
        let profile = profile.ok_or_else(|| AppError::image("ICCBased without a profile"))?;
        let dict = &deref(document, profile)?.as_stream()?.dict;
        match dict.get(b"N").and_then(Object::as_i64) {
            Ok(1) => Ok(Self::Gray),
            Ok(3) => Ok(Self::Rgb),
            Ok(4) => Ok(Self::Cmyk),
            _ => match dict.get(b"Alternate") {
                Ok(alternate) => Self::resolve_nested(document, alternate, depth + 1),
                Err(_) => Err(AppError::image("ICCBased profile without /N or /Alternate")),
            },
        }
    }

    fn indexed(document: &Document, items: &[Object], depth: usize) -> Result<Self> {
        let [_, base, hival, lookup] = items else {
            return Err(AppError::image(format!(
                "Indexed colour space needs 4 entries, got {}",
                items.len()
            )));
        };

        let base = Self::resolve_nested(document, base, depth + 1)?;
        if matches!(base, Self::Indexed { .. }) {
            return Err(AppError::image("Indexed base cannot be Indexed"));
        }
        let hival = deref(document, hival)?.as_i64()?.clamp(0, 255) as u8;
        let lookup = match deref(document, lookup)? {
            Object::String(bytes, _) => bytes.clone(),
            Object::Stream(stream) => stream_bytes(stream)?,
            other => {
                return Err(AppError::image(format!(
                    "unexpected Indexed lookup {other:?}"
                )));
            }
        };

        Ok(Self::Indexed {
            base: Box::new(base),
            hival,
            lookup,
        })
    }
}

fn deref<'a>(document: &'a Document, object: &'a Object) -> Result<&'a Object> {
    match object {
        Object::Reference(id) => Ok(document.get_object(*id)?),
        other => Ok(other),
    }
}

fn stream_bytes(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.get(b"Filter").is_ok() {
        Ok(stream.decompressed_content()?)
    } else {
        Ok(stream.content.clone())
    }
}

/// A parsed PDF catalog.
pub struct CatalogDocument {
    document: Document,
    pages: BTreeMap<u32, ObjectId>,
}

impl CatalogDocument {
    /// Parse a PDF from an in-memory buffer.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(AppError::invalid_pdf("empty input"));
        }
        let document = Document::load_mem(data)?;
        let pages = document.get_pages();
        Ok(Self { document, pages })
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// 1-based page numbers in document order.
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.keys().copied().collect()
    }

    /// Extract the text of a page.
    ///
    /// Text extraction failures are not fatal for a catalog page; they are
    /// logged and yield an empty string.
    pub fn page_text(&self, page: u32) -> String {
        match self.document.extract_text(&[page]) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Text extraction failed on page {}: {}", page, e);
                String::new()
            }
        }
    }

    /// Decode the embedded images of a page, skipping any whose width or
    /// height is below `min_size`.
    pub fn page_images(&self, page: u32, min_size: u32) -> Result<Vec<PageImage>> {
        let page_id = *self
            .pages
            .get(&page)
            .ok_or_else(|| AppError::page(page, "page does not exist"))?;

        let raw_images = self
            .document
            .get_page_images(page_id)
            .map_err(|e| AppError::page(page, e))?;

        let mut images = Vec::new();
        for (index, raw) in raw_images.iter().enumerate() {
            // Cheap reject on the declared size before decoding anything.
            if raw.width < i64::from(min_size) || raw.height < i64::from(min_size) {
                log::debug!(
                    "Page {} image {}: {}x{} below minimum, skipped",
                    page,
                    index,
                    raw.width,
                    raw.height
                );
                continue;
            }

            let raw = RawImage {
                id: raw.id,
                width: raw.width,
                height: raw.height,
                filters: raw.filters.clone().unwrap_or_default(),
            };
            match self.decode_image(&raw) {
                Ok(image) if image.width() >= min_size && image.height() >= min_size => {
                    images.push(PageImage { index, image });
                }
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("Error loading image {} on page {}: {}", index, page, e);
                }
            }
        }

        Ok(images)
    }

    /// Decode one image XObject to RGB.
    fn decode_image(&self, raw: &RawImage) -> Result<RgbImage> {
        let filters = &raw.filters;
        if let Some(filter) = filters
            .iter()
            .find(|f| UNSUPPORTED_FILTERS.contains(&f.as_str()))
        {
            return Err(AppError::image(format!("unsupported filter {filter}")));
        }

        let stream = self.document.get_object(raw.id)?.as_stream()?;

        if let Some((last, leading)) = filters.split_last() {
            if last == "DCTDecode" {
                let jpeg = if leading.is_empty() {
                    stream.content.clone()
                } else {
                    decode_leading_filters(stream, leading)?
                };
                return Ok(to_rgb(image::load_from_memory(&jpeg)?));
            }
        }
        if filters.iter().any(|f| f == "DCTDecode") {
            return Err(AppError::image(format!("unsupported filter chain {filters:?}")));
        }

        // Raw samples, possibly Flate-compressed.
        let samples = if filters.is_empty() {
            stream.content.clone()
        } else {
            stream.decompressed_content()?
        };

        let color_space = match stream.dict.get(b"ColorSpace") {
            Ok(object) => ColorSpace::resolve(&self.document, object)?,
            Err(_) => ColorSpace::Rgb,
        };
        let bits = stream
            .dict
            .get(b"BitsPerComponent")
            .and_then(Object::as_i64)
            .unwrap_or(8);
        let bits = u8::try_from(bits).map_err(AppError::image)?;
        let width = u32::try_from(raw.width).map_err(AppError::image)?;
        let height = u32::try_from(raw.height).map_err(AppError::image)?;
        decode_samples(&samples, width, height, bits, &color_space)
    }
}

/// Undo every filter before a trailing DCTDecode.
fn decode_leading_filters(stream: &Stream, leading: &[String]) -> Result<Vec<u8>> {
    let mut partial = stream.clone();
    let names: Vec<Object> = leading
        .iter()
        .map(|name| Object::Name(name.as_bytes().to_vec()))
        .collect();
    partial.dict.set("Filter", names);
    Ok(partial.decompressed_content()?)
}

/// Convert any decoded image to RGB, flattening alpha onto white.
pub fn to_rgb(image: DynamicImage) -> RgbImage {
    if image.color().has_alpha() {
        flatten_alpha(&image.to_rgba8())
    } else {
        image.to_rgb8()
    }
}

/// Decode packed image samples of `bits` per component into RGB.
pub fn decode_samples(
    data: &[u8],
    width: u32,
    height: u32,
    bits: u8,
    color_space: &ColorSpace,
) -> Result<RgbImage> {
    let mut samples = unpack_samples(data, width, height, color_space.components(), bits)?;
    if bits < 8 && !matches!(color_space, ColorSpace::Indexed { .. }) {
        let max = (1u16 << bits) - 1;
        for sample in &mut samples {
            *sample = (u16::from(*sample) * 255 / max) as u8;
        }
    }
    samples_to_rgb(&samples, width, height, color_space)
}

/// Split packed rows into one byte per sample. Rows start on a byte
/// boundary; 16-bit samples keep their high byte.
pub fn unpack_samples(
    data: &[u8],
    width: u32,
    height: u32,
    components: usize,
    bits: u8,
) -> Result<Vec<u8>> {
    if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        return Err(AppError::image(format!(
            "unsupported bits per component: {bits}"
        )));
    }

    let per_row = width as usize * components;
    let row_bytes = (per_row * usize::from(bits)).div_ceil(8);
    let needed = row_bytes * height as usize;
    if data.len() < needed {
        return Err(AppError::image(format!(
            "expected {} bytes for {}x{} at {} bits, got {}",
            needed,
            width,
            height,
            bits,
            data.len()
        )));
    }

    let data = &data[..needed];
    match bits {
        8 => Ok(data.to_vec()),
        16 => Ok(data.chunks_exact(2).map(|pair| pair[0]).collect()),
        _ => {
            let per_byte = usize::from(8 / bits);
            let mask = (1u8 << bits) - 1;
            let mut samples = Vec::with_capacity(per_row * height as usize);
            for row in data.chunks_exact(row_bytes) {
                samples.extend((0..per_row).map(|i| {
                    let shift = 8 - usize::from(bits) * (i % per_byte + 1);
                    (row[i / per_byte] >> shift) & mask
                }));
            }
            Ok(samples)
        }
    }
}

/// Interpret one byte per component in the given colour space.
pub fn samples_to_rgb(
    samples: &[u8],
    width: u32,
    height: u32,
    color_space: &ColorSpace,
) -> Result<RgbImage> {
    let pixels = width as usize * height as usize;
    let channels = color_space.components();
    let needed = pixels * channels;
    if samples.len() < needed {
        return Err(AppError::image(format!(
            "expected {} samples for {}x{} {}, got {}",
            needed,
            width,
            height,
            color_space.name(),
            samples.len()
        )));
    }
    let samples = &samples[..needed];
    let mismatch = || AppError::image(format!("bad {}x{} image buffer", width, height));

    match color_space {
        ColorSpace::Rgb => RgbImage::from_raw(width, height, samples.to_vec()).ok_or_else(mismatch),
        ColorSpace::Gray => {
            let gray = GrayImage::from_raw(width, height, samples.to_vec()).ok_or_else(mismatch)?;
            Ok(DynamicImage::ImageLuma8(gray).to_rgb8())
        }
        ColorSpace::Cmyk => {
            let rgb: Vec<u8> = samples
                .chunks_exact(4)
                .flat_map(|px| cmyk_to_rgb(px[0], px[1], px[2], px[3]))
                .collect();
            RgbImage::from_raw(width, height, rgb).ok_or_else(mismatch)
        }
        ColorSpace::Indexed {
            base,
            hival,
            lookup,
        } => {
            let entry_len = base.components();
            let mut expanded = Vec::with_capacity(pixels * entry_len);
            for &index in samples {
                let index = usize::from(index.min(*hival));
                let entry = lookup
                    .get(index * entry_len..(index + 1) * entry_len)
                    .ok_or_else(|| AppError::image(format!("palette has no entry {index}")))?;
                expanded.extend_from_slice(entry);
            }
            samples_to_rgb(&expanded, width, height, base)
        }
    }
}

fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let k = 255 - u32::from(k);
    let channel = |v: u8| ((255 - u32::from(v)) * k / 255) as u8;
    [channel(c), channel(m), channel(y)]
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Synthetic PDFs for tests.

    use image::{Rgb, RgbImage};
    use lopdf::content::{Content, Operation};
    use lopdf::{Dictionary, Document, Object, StringFormat, Stream, dictionary};

    /// Colour space written into a fixture image.
    pub enum FixtureColorSpace {
        Named(&'static str),
        /// `[/ICCBased s]` with a profile stream carrying `/N` and optionally
        /// `/Alternate`
        IccBased {
            n: Option<i64>,
            alternate: Option<&'static str>,
        },
        Indexed {
            base: &'static str,
            hival: i64,
            lookup: Vec<u8>,
        },
    }

    /// An embedded image XObject.
    pub struct FixtureImage {
        pub width: u32,
        pub height: u32,
        pub color_space: FixtureColorSpace,
        pub bits: i64,
        pub filters: Vec<&'static str>,
        pub data: Vec<u8>,
        /// Flate-compress `data` and put FlateDecode in front of `filters`
        pub deflate: bool,
    }

    impl FixtureImage {
        pub fn jpeg(width: u32, height: u32) -> Self {
            Self::encoded(width, height, "DCTDecode", jpeg_bytes(width, height, [200, 40, 90]))
        }

        /// An image whose payload is written as-is under `filter`.
        pub fn encoded(width: u32, height: u32, filter: &'static str, data: Vec<u8>) -> Self {
            Self {
                width,
                height,
                color_space: FixtureColorSpace::Named("DeviceRGB"),
                bits: 8,
                filters: vec![filter],
                data,
                deflate: false,
            }
        }

        /// Unfiltered samples.
        pub fn raw(
            width: u32,
            height: u32,
            color_space: FixtureColorSpace,
            bits: i64,
            data: Vec<u8>,
        ) -> Self {
            Self {
                width,
                height,
                color_space,
                bits,
                filters: Vec::new(),
                data,
                deflate: false,
            }
        }

        pub fn deflated(mut self) -> Self {
            self.deflate = true;
            self
        }
    }

    /// A page description: text lines, optional CJK text drawn through a
    /// Type0 font with a ToUnicode map, and embedded images.
    #[derive(Default)]
    pub struct FixturePage<'a> {
        pub lines: &'a [&'a str],
        pub cjk: Option<&'a str>,
        pub images: Vec<FixtureImage>,
    }

    /// A page with text lines and plain JPEGs of the given sizes.
    pub fn page<'a>(lines: &'a [&'a str], jpegs: &[(u32, u32)]) -> FixturePage<'a> {
        FixturePage {
            lines,
            cjk: None,
            images: jpegs.iter().map(|(w, h)| FixtureImage::jpeg(*w, *h)).collect(),
        }
    }

    pub fn jpeg_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        crate::services::collage::encode_jpeg(&img, 90).unwrap()
    }

    fn name_list(names: &[&str]) -> Object {
        match names {
            [single] => Object::Name(single.as_bytes().to_vec()),
            _ => Object::Array(names.iter().map(|n| Object::Name(n.as_bytes().to_vec())).collect()),
        }
    }

    fn color_space_object(doc: &mut Document, color_space: &FixtureColorSpace) -> Object {
        match color_space {
            FixtureColorSpace::Named(name) => Object::Name(name.as_bytes().to_vec()),
            FixtureColorSpace::IccBased { n, alternate } => {
                let mut dict = Dictionary::new();
                if let Some(n) = n {
                    dict.set("N", *n);
                }
                if let Some(alternate) = alternate {
                    dict.set("Alternate", Object::Name(alternate.as_bytes().to_vec()));
                }
                let profile = doc.add_object(Stream::new(dict, vec![0; 128]));
                Object::Array(vec!["ICCBased".into(), profile.into()])
            }
            FixtureColorSpace::Indexed {
                base,
                hival,
                lookup,
            } => Object::Array(vec![
                "Indexed".into(),
                Object::Name(base.as_bytes().to_vec()),
                (*hival).into(),
                Object::String(lookup.clone(), StringFormat::Hexadecimal),
            ]),
        }
    }

    fn image_stream(doc: &mut Document, image: &FixtureImage) -> Stream {
        let dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(image.width),
            "Height" => i64::from(image.height),
            "ColorSpace" => color_space_object(doc, &image.color_space),
            "BitsPerComponent" => image.bits
        };
        let mut stream = Stream::new(dict, image.data.clone());

        let mut filters = image.filters.clone();
        if image.deflate {
            let _ = stream.compress();
            assert!(
                stream.dict.get(b"Filter").is_ok(),
                "fixture data did not compress"
            );
            filters.insert(0, "FlateDecode");
        }
        if !filters.is_empty() {
            stream.dict.set("Filter", name_list(&filters));
        }
        stream
    }

    /// A Type0 font whose ToUnicode map sends codes 1.. to the characters of
    /// `text`, and the two-byte codes that spell it.
    fn cjk_font(doc: &mut Document, text: &str) -> (Object, Vec<u8>) {
        let chars: Vec<char> = text.chars().collect();
        let bfchar: String = chars
            .iter()
            .enumerate()
            .map(|(i, c)| format!("<{:04X}> <{:04X}>\n", i + 1, *c as u32))
            .collect();
        let cmap = format!(
            "/CIDInit /ProcSet findresource begin\n\
             12 dict begin\n\
             begincmap\n\
             /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
             /CMapName /Adobe-Identity-UCS def\n\
             /CMapType 2 def\n\
             1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n\
             {} beginbfchar\n{}endbfchar\n\
             endcmap\n\
             CMapName currentdict /CMap defineresource pop\n\
             end\nend\n",
            chars.len(),
            bfchar
        );
        let to_unicode = doc.add_object(Stream::new(dictionary! {}, cmap.into_bytes()));
        let descendant = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => "SimSun",
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0
            },
            "DW" => 1000
        });
        let font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "SimSun",
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![descendant.into()],
            "ToUnicode" => to_unicode
        });

        let codes = (1..=chars.len() as u16).flat_map(u16::to_be_bytes).collect();
        (font.into(), codes)
    }

    /// Build a PDF with one page per entry.
    pub fn build_pdf(pages: &[FixturePage<'_>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding"
        });

        let mut kids = Vec::new();
        for page in pages {
            let mut fonts = dictionary! { "F1" => font_id };
            let mut xobjects = Dictionary::new();
            let mut operations = Vec::new();
            // One text object per line so extracted lines stay separated.
            for (row, line) in page.lines.iter().enumerate() {
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
                operations.push(Operation::new(
                    "Td",
                    vec![50.into(), (780 - 16 * row as i64).into()],
                ));
                operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
                operations.push(Operation::new("ET", vec![]));
            }

            if let Some(text) = page.cjk {
                let (font, codes) = cjk_font(&mut doc, text);
                fonts.set("F2", font);
                operations.push(Operation::new("BT", vec![]));
                operations.push(Operation::new("Tf", vec!["F2".into(), 12.into()]));
                operations.push(Operation::new("Td", vec![50.into(), 600.into()]));
                operations.push(Operation::new(
                    "Tj",
                    vec![Object::String(codes, StringFormat::Hexadecimal)],
                ));
                operations.push(Operation::new("ET", vec![]));
            }

            for (i, image) in page.images.iter().enumerate() {
                let name = format!("Im{}", i + 1);
                let stream = image_stream(&mut doc, image);
                let image_id = doc.add_object(stream);
                xobjects.set(name.as_bytes().to_vec(), image_id);

                operations.push(Operation::new("q", vec![]));
                operations.push(Operation::new(
                    "cm",
                    vec![100.into(), 0.into(), 0.into(), 100.into(), 50.into(), (50 + 110 * i as i64).into()],
                ));
                operations.push(Operation::new("Do", vec![Object::Name(name.into_bytes())]));
                operations.push(Operation::new("Q", vec![]));
            }

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let resources = dictionary! {
                "Font" => fonts,
                "XObject" => xobjects
            };
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()]
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }
}
