use std::error::Error as _;

use serde::Serialize;
use tera::{Context, Tera};

use crate::error::VwError;

pub const FGDC_TEMPLATE_NAME: &str = "fgdc";

const FGDC_TEMPLATE: &str = include_str!("../../templates/fgdc.xml");

/// Template environment shared by the metadata builders. Build it once
/// before the first render and pass it by reference; it is never mutated
/// after construction.
#[derive(Debug)]
pub struct TemplateEnv {
    tera: Tera,
}

impl TemplateEnv {
    pub fn new() -> Result<Self, VwError> {
        Self::with_fgdc_template(FGDC_TEMPLATE)
    }

    /// Replaces the bundled FGDC template, e.g. for a site-specific profile.
    /// The template sees the same variables as the bundled one.
    pub fn with_fgdc_template(source: &str) -> Result<Self, VwError> {
        let mut tera = Tera::default();
        // Values are escaped explicitly with `escape_xml` in the template.
        tera.autoescape_on(Vec::new());
        tera.add_raw_template(FGDC_TEMPLATE_NAME, source).map_err(render_error)?;
        Ok(Self { tera })
    }

    pub(crate) fn render<T: Serialize>(&self, name: &str, fields: &T) -> Result<String, VwError> {
        let context = Context::from_serialize(fields).map_err(render_error)?;
        self.tera.render(name, &context).map_err(render_error)
    }
}

fn render_error(err: tera::Error) -> VwError {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    VwError::TemplateRender(message)
}
