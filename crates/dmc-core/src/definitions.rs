//! ---
//! dmc_section: "01-core-functionality"
//! dmc_subsection: "module"
//! dmc_type: "source"
//! dmc_scope: "code"
//! dmc_description: "Slide and widget definition lookups producing wire payloads."
//! dmc_version: "v0.0.0-prealpha"
//! dmc_owner: "tbd"
//! ---
use std::collections::HashMap;

use dmc_common::config::{AppConfig, SlideDefinitionConfig, WidgetDefinitionConfig};
use dmc_schemas::{
    widget, Color, ImageWidget, LabelWidget, LineWidget, RectangleWidget, SlideAddRequest,
    VideoWidget, Widget,
};
use indexmap::IndexMap;
use serde_json::Value;

use crate::{DmcError, ResourceKind, Result};

/// Free-form parameters passed from a play intent to the definition lookup.
pub type DefinitionArgs = serde_json::Map<String, Value>;

/// Produces the creation payload for a named slide.
pub trait SlideDefinitions: Send + Sync {
    /// Fails with [`DmcError::NotFound`] when `name` is not configured.
    fn resolve(&self, name: &str, args: &DefinitionArgs) -> Result<SlideAddRequest>;
}

/// Produces the payload for a named widget.
pub trait WidgetDefinitions: Send + Sync {
    /// Fails with [`DmcError::NotFound`] when `name` is not configured.
    fn resolve(&self, name: &str, args: &DefinitionArgs) -> Result<Widget>;
}

type SlideBuilder = Box<dyn Fn(&DefinitionArgs) -> SlideAddRequest + Send + Sync>;
type WidgetBuilder = Box<dyn Fn(&DefinitionArgs) -> Widget + Send + Sync>;

/// Definitions backed by builder closures registered in code.
#[derive(Default)]
pub struct FnDefinitions {
    slides: HashMap<String, SlideBuilder>,
    widgets: HashMap<String, WidgetBuilder>,
}

impl FnDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slide<F>(mut self, name: impl Into<String>, builder: F) -> Self
    where
        F: Fn(&DefinitionArgs) -> SlideAddRequest + Send + Sync + 'static,
    {
        self.slides.insert(name.into(), Box::new(builder));
        self
    }

    pub fn with_widget<F>(mut self, name: impl Into<String>, builder: F) -> Self
    where
        F: Fn(&DefinitionArgs) -> Widget + Send + Sync + 'static,
    {
        self.widgets.insert(name.into(), Box::new(builder));
        self
    }
}

impl SlideDefinitions for FnDefinitions {
    fn resolve(&self, name: &str, args: &DefinitionArgs) -> Result<SlideAddRequest> {
        let builder = self
            .slides
            .get(name)
            .ok_or_else(|| DmcError::not_found(ResourceKind::Slide, name))?;
        Ok(builder(args))
    }
}

impl WidgetDefinitions for FnDefinitions {
    fn resolve(&self, name: &str, args: &DefinitionArgs) -> Result<Widget> {
        let builder = self
            .widgets
            .get(name)
            .ok_or_else(|| DmcError::not_found(ResourceKind::Widget, name))?;
        Ok(builder(args))
    }
}

impl std::fmt::Debug for FnDefinitions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnDefinitions")
            .field("slides", &self.slides.keys().collect::<Vec<_>>())
            .field("widgets", &self.widgets.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Definitions declared in the `[slides]` and `[widgets]` configuration tables.
#[derive(Debug, Clone, Default)]
pub struct ConfigDefinitions {
    slides: IndexMap<String, SlideDefinitionConfig>,
    widgets: IndexMap<String, WidgetDefinitionConfig>,
}

impl ConfigDefinitions {
    pub fn new(
        slides: IndexMap<String, SlideDefinitionConfig>,
        widgets: IndexMap<String, WidgetDefinitionConfig>,
    ) -> Self {
        Self { slides, widgets }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.slides.clone(), config.widgets.clone())
    }

    fn build_widget(
        name: &str,
        definition: &WidgetDefinitionConfig,
        args: &DefinitionArgs,
    ) -> Result<Widget> {
        let kind = if let Some(rect) = &definition.rectangle {
            widget::Kind::Rectangle(RectangleWidget {
                color: Some(color(rect.color)),
                width: rect.width,
                height: rect.height,
            })
        } else if let Some(label) = &definition.label {
            widget::Kind::Label(LabelWidget {
                color: Some(color(label.color)),
                text: render_template(&label.text, args),
                font_name: label.font_name.clone(),
                font_size: label.font_size,
            })
        } else if let Some(image) = &definition.image {
            widget::Kind::Image(ImageWidget {
                path: image.path.clone(),
            })
        } else if let Some(video) = &definition.video {
            widget::Kind::Video(VideoWidget {
                path: video.path.clone(),
            })
        } else if let Some(line) = &definition.line {
            widget::Kind::Line(LineWidget {
                color: Some(color(line.color)),
                x1: line.x1,
                y1: line.y1,
                x2: line.x2,
                y2: line.y2,
                width: line.width,
            })
        } else {
            return Err(DmcError::Definition {
                name: name.to_owned(),
                reason: "widget does not declare a kind".into(),
            });
        };

        Ok(Widget {
            x: definition.x,
            y: definition.y,
            z: definition.z,
            kind: Some(kind),
        })
    }
}

impl SlideDefinitions for ConfigDefinitions {
    fn resolve(&self, name: &str, args: &DefinitionArgs) -> Result<SlideAddRequest> {
        let slide = self
            .slides
            .get(name)
            .ok_or_else(|| DmcError::not_found(ResourceKind::Slide, name))?;
        let widgets = slide
            .widgets
            .iter()
            .map(|widget| {
                WidgetDefinitions::resolve(self, widget, args).map_err(|err| match err {
                    DmcError::NotFound { name: missing, .. } => DmcError::Definition {
                        name: name.to_owned(),
                        reason: format!("references undefined widget '{}'", missing),
                    },
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(SlideAddRequest { widgets })
    }
}

impl WidgetDefinitions for ConfigDefinitions {
    fn resolve(&self, name: &str, args: &DefinitionArgs) -> Result<Widget> {
        let definition = self
            .widgets
            .get(name)
            .ok_or_else(|| DmcError::not_found(ResourceKind::Widget, name))?;
        Self::build_widget(name, definition, args)
    }
}

fn color([red, green, blue, alpha]: [f32; 4]) -> Color {
    Color {
        red,
        green,
        blue,
        alpha,
    }
}

/// Replace `{path.to.key}` placeholders with values from `args`.
///
/// Unresolvable placeholders and unmatched braces are kept verbatim.
pub fn render_template(template: &str, args: &DefinitionArgs) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = &after[..end];
        match lookup_path(args, key) {
            Some(value) => out.push_str(&value),
            None => {
                out.push('{');
                out.push_str(key);
                out.push('}');
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    out
}

fn lookup_path(args: &DefinitionArgs, path: &str) -> Option<String> {
    let mut segments = path.split('.');
    let mut current = args.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    match current {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
