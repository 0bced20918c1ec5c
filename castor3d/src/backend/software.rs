//! Source validation and reflection shared by the programmable backends.
//!
//! This is not a compiler. It catches the mistakes which would make a driver
//! refuse a stage (empty source, unbalanced braces, `#error`, no entry point)
//! and collects the uniform declarations so programs can resolve locations
//! and block bindings. Logs follow the `ERROR: 0:<line>: <message>` shape
//! drivers use.

use castor3d_types::{ElementKind, Shape, ShaderObjectHandle, ShaderType, VariableType};

use super::StageOutput;
use crate::util::typedefs::{FastIndexMap, SsoString};

/// A loose `uniform type name[N];` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformDecl {
    pub name: SsoString,
    pub ty: VariableType,
    pub occurrences: usize,
}

/// A `uniform Name { ... };` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDecl {
    pub name: SsoString,
    pub members: Vec<UniformDecl>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReflection {
    pub uniforms: Vec<UniformDecl>,
    pub blocks: Vec<BlockDecl>,
    pub has_main: bool,
}

/// Maps GLSL type names onto variable types. Opaque types such as samplers
/// aren't variables and map to `None`.
pub fn glsl_type(name: &str) -> Option<VariableType> {
    let scalar = |kind| Some(VariableType::scalar(kind));
    match name {
        "bool" => return scalar(ElementKind::Bool),
        "int" => return scalar(ElementKind::Int),
        "uint" => return scalar(ElementKind::UInt),
        "float" => return scalar(ElementKind::Float),
        "double" => return scalar(ElementKind::Double),
        _ => {}
    }

    let (kind, rest) = match name.as_bytes().first()? {
        b'b' => (ElementKind::Bool, &name[1..]),
        b'i' => (ElementKind::Int, &name[1..]),
        b'u' => (ElementKind::UInt, &name[1..]),
        b'd' => (ElementKind::Double, &name[1..]),
        _ => (ElementKind::Float, name),
    };

    let digit = |b: u8| (b as char).to_digit(10).map(|d| d as u8);
    if let Some(count) = rest.strip_prefix("vec") {
        let &[n] = count.as_bytes() else { return None };
        return Some(VariableType::new(kind, Shape::vector(digit(n)? as usize)?));
    }
    if let Some(size) = rest.strip_prefix("mat") {
        if !matches!(kind, ElementKind::Float | ElementKind::Double) {
            return None;
        }
        let shape = match *size.as_bytes() {
            [n] => Shape::matrix(digit(n)?, digit(n)?)?,
            [c, b'x', r] => Shape::matrix(digit(c)?, digit(r)?)?,
            _ => return None,
        };
        return Some(VariableType::new(kind, shape));
    }
    None
}

fn strip_comments(source: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut in_block = false;
    for (index, line) in source.lines().enumerate() {
        let mut out = String::with_capacity(line.len());
        let mut rest = line;
        while !rest.is_empty() {
            if in_block {
                match rest.find("*/") {
                    Some(end) => {
                        rest = &rest[end + 2..];
                        in_block = false;
                    }
                    None => rest = "",
                }
            } else if let Some(start) = rest.find(['/']) {
                let tail = &rest[start..];
                if tail.starts_with("//") {
                    out.push_str(&rest[..start]);
                    rest = "";
                } else if tail.starts_with("/*") {
                    out.push_str(&rest[..start]);
                    out.push(' ');
                    rest = &rest[start + 2..];
                    in_block = true;
                } else {
                    out.push_str(&rest[..=start]);
                    rest = &rest[start + 1..];
                }
            } else {
                out.push_str(rest);
                rest = "";
            }
        }
        lines.push((index + 1, out));
    }
    lines
}

fn tokenize(line: &str, tokens: &mut Vec<String>) {
    let mut ident = String::new();
    for c in line.chars() {
        if c.is_alphanumeric() || c == '_' {
            ident.push(c);
            continue;
        }
        if !ident.is_empty() {
            tokens.push(std::mem::take(&mut ident));
        }
        if !c.is_whitespace() {
            tokens.push(c.to_string());
        }
    }
    if !ident.is_empty() {
        tokens.push(ident);
    }
}

const QUALIFIERS: [&str; 5] = ["lowp", "mediump", "highp", "flat", "invariant"];

struct Tokens {
    tokens: Vec<String>,
    position: usize,
}

impl Tokens {
    fn next(&mut self) -> Option<&str> {
        while let Some(token) = self.tokens.get(self.position) {
            self.position += 1;
            if !QUALIFIERS.contains(&token.as_str()) {
                return Some(token);
            }
        }
        None
    }

    fn peek(&self) -> Option<&str> {
        self.tokens.get(self.position).map(String::as_str)
    }

    fn skip_to(&mut self, token: &str) {
        while let Some(next) = self.tokens.get(self.position) {
            self.position += 1;
            if next == token {
                return;
            }
        }
    }

    /// `type name [N] ;`, consuming the terminating `;`.
    fn declaration(&mut self, ty: &str) -> Option<UniformDecl> {
        let ty = glsl_type(ty);
        let name = SsoString::from(self.next()?);
        let mut occurrences = 1;
        if self.peek() == Some("[") {
            self.next();
            occurrences = self.next()?.parse().ok()?;
            self.skip_to("]");
        }
        self.skip_to(";");
        Some(UniformDecl {
            name,
            ty: ty?,
            occurrences,
        })
    }
}

fn reflect(lines: &[(usize, String)]) -> StageReflection {
    let mut tokens = Vec::new();
    for (_, line) in lines {
        if !line.trim_start().starts_with('#') {
            tokenize(line, &mut tokens);
        }
    }
    let has_main = tokens.windows(3).any(|w| w[0] == "void" && w[1] == "main" && w[2] == "(");

    let mut tokens = Tokens { tokens, position: 0 };
    let mut reflection = StageReflection {
        has_main,
        ..StageReflection::default()
    };

    while let Some(token) = tokens.next() {
        if token != "uniform" {
            continue;
        }
        let Some(ty) = tokens.next().map(String::from) else {
            break;
        };
        if tokens.peek() == Some("{") {
            tokens.next();
            let mut members = Vec::new();
            while let Some(member_ty) = tokens.next().map(String::from) {
                if member_ty == "}" {
                    break;
                }
                members.extend(tokens.declaration(&member_ty));
            }
            tokens.skip_to(";");
            reflection.blocks.push(BlockDecl {
                name: SsoString::from(ty),
                members,
            });
        } else {
            reflection.uniforms.extend(tokens.declaration(&ty));
        }
    }
    reflection
}

/// Validates one stage and reflects its uniforms.
pub fn compile(stage: ShaderType, source: &str) -> Result<StageReflection, String> {
    if source.trim().is_empty() {
        return Err(format!("ERROR: 0:0: empty {} source", stage.name()));
    }

    let lines = strip_comments(source);
    let mut depth = 0_i32;
    let mut last_line = 0;
    for (line_number, line) in &lines {
        last_line = *line_number;
        if let Some(message) = line.trim_start().strip_prefix("#error") {
            return Err(format!("ERROR: 0:{}: '#error' :{}", line_number, message));
        }
        for c in line.chars() {
            match c {
                '{' => depth += 1,
                '}' => depth -= 1,
                _ => {}
            }
            if depth < 0 {
                return Err(format!("ERROR: 0:{}: '}}' : syntax error, unexpected closing brace", line_number));
            }
        }
    }
    if depth != 0 {
        return Err(format!("ERROR: 0:{}: syntax error, unexpected end of file", last_line));
    }

    Ok(reflect(&lines))
}

#[derive(Debug)]
pub struct SoftwareShader {
    pub stage: ShaderType,
    pub reflection: Option<StageReflection>,
}

/// A program as the programmable backends see it. Uniform locations are
/// indices into `uniforms`, block bindings indices into `blocks`.
#[derive(Debug, Default)]
pub struct SoftwareProgram {
    pub id: u32,
    attached: Vec<(ShaderObjectHandle, ShaderType, Option<StageReflection>)>,
    pub uniforms: FastIndexMap<SsoString, UniformDecl>,
    pub blocks: FastIndexMap<SsoString, BlockDecl>,
    pub linked: bool,
}

impl SoftwareProgram {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn attach(&mut self, handle: ShaderObjectHandle, shader: &SoftwareShader) {
        self.attached.retain(|(h, ..)| *h != handle);
        self.attached.push((handle, shader.stage, shader.reflection.clone()));
    }

    pub fn detach(&mut self, handle: ShaderObjectHandle) {
        self.attached.retain(|(h, ..)| *h != handle);
        self.linked = false;
    }

    pub fn link(&mut self) -> StageOutput {
        self.linked = false;
        self.uniforms.clear();
        self.blocks.clear();

        if self.attached.is_empty() {
            return StageOutput::failed("ERROR: no shader attached");
        }
        let has = |stage| self.attached.iter().any(|(_, s, _)| *s == stage);
        if has(ShaderType::Pixel) && !has(ShaderType::Vertex) {
            return StageOutput::failed("ERROR: pixel stage without vertex stage");
        }

        let mut log = String::new();
        for (_, stage, reflection) in &self.attached {
            let Some(reflection) = reflection else {
                log.push_str(&format!("ERROR: {} stage isn't compiled\n", stage.name()));
                continue;
            };
            if !reflection.has_main {
                log.push_str(&format!("ERROR: {} stage has no main function\n", stage.name()));
            }
            for uniform in &reflection.uniforms {
                match self.uniforms.get(&uniform.name) {
                    Some(existing) if existing.ty != uniform.ty || existing.occurrences != uniform.occurrences => {
                        log.push_str(&format!(
                            "ERROR: uniform '{}' declared as {} and {}\n",
                            uniform.name, existing.ty, uniform.ty
                        ));
                    }
                    Some(_) => {}
                    None => {
                        self.uniforms.insert(uniform.name.clone(), uniform.clone());
                    }
                }
            }
            for block in &reflection.blocks {
                match self.blocks.get(&block.name) {
                    Some(existing) if existing != block => {
                        log.push_str(&format!("ERROR: uniform block '{}' differs between stages\n", block.name));
                    }
                    Some(_) => {}
                    None => {
                        self.blocks.insert(block.name.clone(), block.clone());
                    }
                }
            }
        }

        self.linked = log.is_empty();
        StageOutput {
            success: self.linked,
            log,
        }
    }

    pub fn uniform(&self, location: u32) -> Option<&UniformDecl> {
        self.uniforms.get_index(location as usize).map(|(_, decl)| decl)
    }

    pub fn location(&self, name: &str) -> Option<u32> {
        self.uniforms.get_index_of(name).map(|index| index as u32)
    }

    pub fn binding(&self, name: &str) -> Option<u32> {
        self.blocks.get_index_of(name).map(|index| index as u32)
    }

    /// Checks `variable` can be written to the uniform at `location`.
    pub fn check_write(&self, location: u32, ty: VariableType, occurrences: usize) -> Result<&UniformDecl, String> {
        let decl = self
            .uniform(location)
            .ok_or_else(|| format!("no active uniform at location {}", location))?;
        if decl.ty != ty {
            return Err(format!("uniform {} is a {} but was written as a {}", decl.name, decl.ty, ty));
        }
        if occurrences > decl.occurrences {
            return Err(format!(
                "uniform {} holds {} values but was written {}",
                decl.name, decl.occurrences, occurrences
            ));
        }
        Ok(decl)
    }
}

#[cfg(test)]
mod tests {
    use castor3d_types::{ShaderObjectHandle, ShaderType, VariableType};

    use super::*;

    const VERTEX: &str = r"
        #version 330
        uniform mat4 c3d_mtxProjection; // projection
        uniform Matrices
        {
            mat4 c3d_mtxView;
            highp vec3 c3d_cameraPos;
        };
        /* multi
           line { */
        uniform float c3d_weights[4];
        uniform sampler2D c3d_map;
        void main()
        {
            gl_Position = vec4(0.0);
        }
    ";

    #[test]
    fn glsl_types() {
        assert_eq!(glsl_type("vec3"), VariableType::from_name("vec3f"));
        assert_eq!(glsl_type("uvec2"), VariableType::from_name("vec2ui"));
        assert_eq!(glsl_type("dmat2x3"), VariableType::from_name("mat2x3d"));
        assert_eq!(glsl_type("mat4"), VariableType::from_name("mat4x4f"));
        assert_eq!(glsl_type("imat4"), None);
        assert_eq!(glsl_type("sampler2D"), None);
    }

    #[test]
    fn reflection() {
        let reflection = compile(ShaderType::Vertex, VERTEX).unwrap();
        assert!(reflection.has_main);
        let names: Vec<&str> = reflection.uniforms.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["c3d_mtxProjection", "c3d_weights"]);
        assert_eq!(reflection.uniforms[1].occurrences, 4);
        assert_eq!(reflection.blocks[0].name, "Matrices");
        assert_eq!(reflection.blocks[0].members.len(), 2);
    }

    #[test]
    fn compile_errors() {
        assert!(compile(ShaderType::Pixel, "  ").is_err());
        let log = compile(ShaderType::Pixel, "void main()\n{\n").unwrap_err();
        assert!(log.starts_with("ERROR: 0:2:"));
        let log = compile(ShaderType::Pixel, "#error broken on purpose\nvoid main() {}").unwrap_err();
        assert!(log.contains("broken on purpose"));
    }

    #[test]
    fn conflicting_uniforms_fail_to_link() {
        let vertex = SoftwareShader {
            stage: ShaderType::Vertex,
            reflection: Some(compile(ShaderType::Vertex, "uniform vec3 a; void main() {}").unwrap()),
        };
        let pixel = SoftwareShader {
            stage: ShaderType::Pixel,
            reflection: Some(compile(ShaderType::Pixel, "uniform float a; void main() {}").unwrap()),
        };
        let mut program = SoftwareProgram::new(1);
        program.attach(ShaderObjectHandle::new(0), &vertex);
        program.attach(ShaderObjectHandle::new(1), &pixel);
        let output = program.link();
        assert!(!output.success);
        assert!(output.log.contains("'a'"));

        program.detach(ShaderObjectHandle::new(1));
        assert!(program.link().success);
        assert_eq!(program.location("a"), Some(0));
    }
}
