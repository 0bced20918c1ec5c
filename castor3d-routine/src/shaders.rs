//! Shader sources, and the preprocessor which expands their includes.
//!
//! Sources are handlebars templates. `{{include "castor3d/file.glsl"}}`
//! pastes another registered file, once per shader, and the fields of
//! [`ShaderConfig`] are available by name.

use std::collections::{HashMap, HashSet};

use castor3d::{shader::ShaderProgram, types::ShaderType};
use handlebars::{Context, Handlebars, Helper, HelperDef, Output, RenderContext, RenderError};
use parking_lot::Mutex;
use rust_embed::RustEmbed;
use serde::Serialize;

#[derive(RustEmbed)]
#[folder = "$CARGO_MANIFEST_DIR/shaders"]
struct Castor3dShaderSources;

/// Most lights the scene uniform block holds.
pub const MAX_LIGHTS: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct ShaderConfig {
    pub max_lights: usize,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self { max_lights: MAX_LIGHTS }
    }
}

pub struct ShaderPreProcessor {
    files: HashMap<String, String>,
}

impl ShaderPreProcessor {
    pub fn new() -> Self {
        let mut v = Self { files: HashMap::new() };
        v.add_shaders_embed::<Castor3dShaderSources>("castor3d");
        v
    }

    pub fn add_shaders_embed<T: RustEmbed>(&mut self, prefix: &str) {
        for file in T::iter() {
            let Some(embedded) = T::get(&file) else {
                continue;
            };
            match String::from_utf8(embedded.data.into_owned()) {
                Ok(contents) => {
                    self.files.insert(format!("{prefix}/{file}"), contents);
                }
                Err(_) => log::error!("Shader {prefix}/{file} isn't valid UTF-8"),
            }
        }
    }

    pub fn add_shader(&mut self, name: &str, contents: &str) {
        self.files.insert(name.to_owned(), contents.to_owned());
    }

    pub fn get(&self, name: &str) -> Option<&String> {
        self.files.get(name)
    }

    pub fn render_shader(&self, base: &str, config: &ShaderConfig) -> Result<String, RenderError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        registry.register_helper("include", Box::new(ShaderIncluder::new(base, &self.files)));

        let contents = self.files.get(base).ok_or_else(|| {
            RenderError::new(format!(
                "Base shader {base} is not registered. All registered shaders: {}",
                registered_shader_string(&self.files)
            ))
        })?;

        registry.render_template(contents, config)
    }

    /// Builds a program from a vertex and a pixel template. A template which
    /// fails to render leaves its stage empty, which the program reports when
    /// it initialises.
    pub fn program(&self, name: &str, vertex: &str, pixel: &str, config: &ShaderConfig) -> ShaderProgram {
        let mut program = ShaderProgram::new(name);
        for (stage, base) in [(ShaderType::Vertex, vertex), (ShaderType::Pixel, pixel)] {
            match self.render_shader(base, config) {
                Ok(source) => program.set_source(stage, source),
                Err(error) => log::error!("Shader program {:?}: {}", name, error),
            }
        }
        program
    }
}

impl Default for ShaderPreProcessor {
    fn default() -> Self {
        Self::new()
    }
}

fn registered_shader_string(files: &HashMap<String, String>) -> String {
    let mut v: Vec<_> = files.keys().cloned().collect();
    v.sort_unstable();
    v.join(", ")
}

struct ShaderIncluder<'a> {
    files: &'a HashMap<String, String>,
    include_state: Mutex<HashSet<String>>,
}

impl<'a> ShaderIncluder<'a> {
    fn new(base: &str, files: &'a HashMap<String, String>) -> Self {
        Self {
            files,
            include_state: Mutex::new({
                let mut set = HashSet::new();
                set.insert(base.to_owned());
                set
            }),
        }
    }
}

impl<'a> HelperDef for ShaderIncluder<'a> {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        r: &'reg Handlebars<'reg>,
        ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> handlebars::HelperResult {
        let file_name_value = h
            .param(0)
            .ok_or_else(|| RenderError::new("include helper must have a single argument for the include path"))?
            .value();
        let file_name = match file_name_value {
            handlebars::JsonValue::String(s) => s,
            _ => return Err(RenderError::new("include helper's first argument must be a string")),
        };

        {
            let mut include_status = self.include_state.lock();
            if !include_status.insert(file_name.clone()) {
                return Ok(());
            }
        }

        let contents = self.files.get(file_name).ok_or_else(|| {
            RenderError::new(format!(
                "Included file \"{file_name}\" is not registered. All registered files: {}",
                registered_shader_string(self.files)
            ))
        })?;

        out.write(&r.render_template(contents, ctx.data())?)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ShaderConfig, ShaderPreProcessor};

    #[test]
    fn includes_expand_once() {
        let mut pp = ShaderPreProcessor::new();
        pp.add_shader("test/common.glsl", "float common_value;\n");
        pp.add_shader(
            "test/base.glsl",
            "{{include \"test/common.glsl\"}}{{include \"test/common.glsl\"}}void main() {}\n",
        );
        let output = pp.render_shader("test/base.glsl", &ShaderConfig::default()).unwrap();
        assert_eq!(output.matches("common_value").count(), 1);
    }

    #[test]
    fn config_reaches_includes() {
        let pp = ShaderPreProcessor::new();
        let output = pp
            .render_shader("castor3d/forward.frag.glsl", &ShaderConfig { max_lights: 3 })
            .unwrap();
        assert!(output.contains("Light lights[3];"));
        assert!(output.contains("uniform PassData"));
    }

    #[test]
    fn missing_includes_are_errors() {
        let mut pp = ShaderPreProcessor::new();
        pp.add_shader("test/broken.glsl", "{{include \"test/nowhere.glsl\"}}");
        assert!(pp.render_shader("test/broken.glsl", &ShaderConfig::default()).is_err());
    }
}
