//! Drawing raster images onto existing PDF pages

use lopdf::{dictionary, Dictionary, Object, ObjectId, Stream};

use crate::coords::PdfRect;
use crate::error::PdfError;
use crate::image::{deflate, RasterImage};
use crate::parser::PdfDocument;

/// Handle to an image XObject already added to the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedImage {
    id: ObjectId,
}

impl EmbeddedImage {
    fn resource_name(&self) -> String {
        format!("SigIm{}_{}", self.id.0, self.id.1)
    }
}

/// Where a page's resource dictionary lives
enum ResourcesLocation {
    Inline,
    Shared(ObjectId),
}

impl PdfDocument {
    /// Add the image (and its soft mask, if any) to the document once so it
    /// can be drawn on any number of pages
    pub fn embed_image(&mut self, image: &RasterImage) -> Result<EmbeddedImage, PdfError> {
        let mut image_dict = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => image.width as i64,
            "Height" => image.height as i64,
            "ColorSpace" => image.components.pdf_name(),
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };

        if let Some(alpha) = &image.alpha {
            let smask = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => image.width as i64,
                    "Height" => image.height as i64,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                deflate(alpha)?,
            );
            let smask_id = self.doc.add_object(Object::Stream(smask));
            image_dict.set("SMask", Object::Reference(smask_id));
        }

        let stream = Stream::new(image_dict, deflate(&image.color)?);
        let id = self.doc.add_object(Object::Stream(stream));
        Ok(EmbeddedImage { id })
    }

    /// Paint an embedded image into `rect` (PDF user space) on a 1-indexed page
    pub fn draw_image(
        &mut self,
        page_num: u32,
        image: &EmbeddedImage,
        rect: PdfRect,
    ) -> Result<(), PdfError> {
        let page_id = self
            .page_id(page_num)
            .ok_or(PdfError::PageNotFound(page_num))?;

        let name = image.resource_name();
        self.register_xobject(page_id, name.as_bytes(), image.id)?;

        let content = format!(
            "q\n{w:.4} 0 0 {h:.4} {x:.4} {y:.4} cm\n/{name} Do\nQ\n",
            w = rect.width,
            h = rect.height,
            x = rect.x,
            y = rect.y,
            name = name,
        );
        self.append_page_content(page_id, content.into_bytes())
    }

    /// Make `name` resolve to `xobject_id` in the page's XObject resources
    fn register_xobject(
        &mut self,
        page_id: ObjectId,
        name: &[u8],
        xobject_id: ObjectId,
    ) -> Result<(), PdfError> {
        let location = self.prepare_page_resources(page_id)?;

        let shared_xobjects = {
            let resources = self.resources_mut(page_id, &location)?;
            match resources.get(b"XObject") {
                Ok(Object::Reference(id)) => Some(*id),
                Ok(Object::Dictionary(_)) => None,
                _ => {
                    resources.set("XObject", Dictionary::new());
                    None
                }
            }
        };

        let xobjects = match shared_xobjects {
            Some(id) => self.doc.get_object_mut(id)?.as_dict_mut()?,
            None => self
                .resources_mut(page_id, &location)?
                .get_mut(b"XObject")?
                .as_dict_mut()?,
        };
        xobjects.set(name.to_vec(), Object::Reference(xobject_id));
        Ok(())
    }

    /// Ensure the page carries its own Resources entry. Inherited resources
    /// are copied down so that adding an XObject does not hide them.
    fn prepare_page_resources(&mut self, page_id: ObjectId) -> Result<ResourcesLocation, PdfError> {
        let (existing, parent) = {
            let page = self.doc.get_object(page_id)?.as_dict()?;
            let existing = match page.get(b"Resources") {
                Ok(Object::Reference(id)) => Some(ResourcesLocation::Shared(*id)),
                Ok(Object::Dictionary(_)) => Some(ResourcesLocation::Inline),
                _ => None,
            };
            (existing, page.get(b"Parent").and_then(Object::as_reference).ok())
        };

        if let Some(location) = existing {
            return Ok(location);
        }

        let inherited = self.inherited_resources(parent).unwrap_or_default();
        self.doc
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Resources", Object::Dictionary(inherited));
        Ok(ResourcesLocation::Inline)
    }

    fn inherited_resources(&self, mut parent: Option<ObjectId>) -> Option<Dictionary> {
        for _ in 0..32 {
            let node = self.doc.get_object(parent?).ok()?.as_dict().ok()?;
            match node.get(b"Resources") {
                Ok(Object::Dictionary(dict)) => return Some(dict.clone()),
                Ok(Object::Reference(id)) => {
                    return self
                        .doc
                        .get_object(*id)
                        .and_then(Object::as_dict)
                        .ok()
                        .cloned()
                }
                _ => parent = node.get(b"Parent").and_then(Object::as_reference).ok(),
            }
        }
        None
    }

    fn resources_mut(
        &mut self,
        page_id: ObjectId,
        location: &ResourcesLocation,
    ) -> Result<&mut Dictionary, PdfError> {
        let resources = match location {
            ResourcesLocation::Shared(id) => self.doc.get_object_mut(*id)?.as_dict_mut()?,
            ResourcesLocation::Inline => self
                .doc
                .get_object_mut(page_id)?
                .as_dict_mut()?
                .get_mut(b"Resources")?
                .as_dict_mut()?,
        };
        Ok(resources)
    }

    /// Append a content stream to the page. The first append on a page also
    /// brackets the existing content with `q`/`Q` so our drawing starts from
    /// the default graphics state.
    fn append_page_content(&mut self, page_id: ObjectId, content: Vec<u8>) -> Result<(), PdfError> {
        let mut contents = self.page_contents(page_id)?;

        if self.wrapped_pages.insert(page_id) {
            let open_id = self
                .doc
                .add_object(Object::Stream(Stream::new(dictionary! {}, b"q\n".to_vec())));
            let close_id = self
                .doc
                .add_object(Object::Stream(Stream::new(dictionary! {}, b"Q\n".to_vec())));
            contents.insert(0, Object::Reference(open_id));
            contents.push(Object::Reference(close_id));
        }

        let stream_id = self
            .doc
            .add_object(Object::Stream(Stream::new(dictionary! {}, content)));
        contents.push(Object::Reference(stream_id));

        self.doc
            .get_object_mut(page_id)?
            .as_dict_mut()?
            .set("Contents", Object::Array(contents));
        Ok(())
    }

    /// The page's content stream references as a flat list
    fn page_contents(&self, page_id: ObjectId) -> Result<Vec<Object>, PdfError> {
        let page = self.doc.get_object(page_id)?.as_dict()?;
        let contents = match page.get(b"Contents") {
            Ok(Object::Array(items)) => items.clone(),
            Ok(Object::Reference(id)) => match self.doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            _ => Vec::new(),
        };
        Ok(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{pdf_with_pages, solid_png};

    fn stamped(png: &[u8]) -> (PdfDocument, EmbeddedImage) {
        let bytes = pdf_with_pages(&[[0, 0, 612, 792], [0, 0, 612, 792]]);
        let mut pdf = PdfDocument::from_bytes(&bytes).unwrap();
        let image = RasterImage::from_png(png).unwrap();
        let embedded = pdf.embed_image(&image).unwrap();
        (pdf, embedded)
    }

    fn rect() -> PdfRect {
        PdfRect {
            x: 100.0,
            y: 200.0,
            width: 150.0,
            height: 60.0,
        }
    }

    #[test]
    fn test_draw_image_adds_xobject_and_content() {
        let (mut pdf, image) = stamped(&solid_png(8, 4, [0, 0, 0, 255]));
        pdf.draw_image(1, &image, rect()).unwrap();

        let page_id = pdf.page_id(1).unwrap();
        let page = pdf.doc.get_object(page_id).unwrap().as_dict().unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        assert!(xobjects.has(image.resource_name().as_bytes()));

        // q, original, Q, drawing
        let contents = page.get(b"Contents").unwrap().as_array().unwrap();
        assert_eq!(contents.len(), 4);
    }

    #[test]
    fn test_inherited_fonts_survive() {
        let (mut pdf, image) = stamped(&solid_png(2, 2, [0, 0, 0, 255]));
        pdf.draw_image(1, &image, rect()).unwrap();

        let page_id = pdf.page_id(1).unwrap();
        let page = pdf.doc.get_object(page_id).unwrap().as_dict().unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        assert!(resources.has(b"Font"));
    }

    #[test]
    fn test_second_draw_does_not_rewrap() {
        let (mut pdf, image) = stamped(&solid_png(2, 2, [0, 0, 0, 255]));
        pdf.draw_image(1, &image, rect()).unwrap();
        pdf.draw_image(1, &image, rect()).unwrap();

        let page_id = pdf.page_id(1).unwrap();
        let page = pdf.doc.get_object(page_id).unwrap().as_dict().unwrap();
        let contents = page.get(b"Contents").unwrap().as_array().unwrap();
        assert_eq!(contents.len(), 5);
    }

    #[test]
    fn test_translucent_image_gets_smask() {
        let (pdf, image) = stamped(&solid_png(2, 2, [0, 0, 0, 0]));
        let stream = pdf.doc.get_object(image.id).unwrap().as_stream().unwrap();
        assert!(stream.dict.has(b"SMask"));
    }

    #[test]
    fn test_missing_page_is_reported() {
        let (mut pdf, image) = stamped(&solid_png(2, 2, [0, 0, 0, 255]));
        let result = pdf.draw_image(7, &image, rect());
        assert!(matches!(result, Err(PdfError::PageNotFound(7))));
    }

    #[test]
    fn test_stamped_pdf_reloads() {
        let (mut pdf, image) = stamped(&solid_png(2, 2, [255, 0, 0, 255]));
        pdf.draw_image(2, &image, rect()).unwrap();
        let bytes = pdf.save_to_bytes().unwrap();

        let reloaded = PdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(reloaded.page_count(), 2);
    }
}
