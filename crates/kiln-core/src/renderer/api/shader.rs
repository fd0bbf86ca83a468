// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shader sources, stage multiplexing and program reflection.
//!
//! A program is authored as a single source string holding both stages, each guarded by
//! `#ifdef VERTEX_SHADER` / `#ifdef FRAGMENT_SHADER`. [`StageSources::split`] turns it into
//! two independent stage sources by injecting the matching `#define` right after the
//! `#version` directive (or at the very top when there is none).

use crate::math::Mat4;
use std::borrow::Cow;
use std::fmt;

/// Attribute names bound to fixed locations before every link.
pub const RESERVED_ATTRIBUTE_LOCATIONS: [(&str, u32); 4] = [
    ("aPosition", 0),
    ("aColor", 1),
    ("aTexCoord", 2),
    ("aNormal", 3),
];

/// One of the two programmable stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// The vertex stage.
    Vertex,
    /// The fragment stage.
    Fragment,
}

impl ShaderStage {
    /// Both stages, in compile order.
    pub const ALL: [ShaderStage; 2] = [ShaderStage::Vertex, ShaderStage::Fragment];

    /// The macro injected to select this stage.
    pub const fn define(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "VERTEX_SHADER",
            ShaderStage::Fragment => "FRAGMENT_SHADER",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// The shading language dialect a source is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderDialect {
    /// GLSL ES 1.00: no `#version` directive, or `#version 100`.
    Legacy,
    /// GLSL ES 3.00: `#version 300 es`.
    Es300,
}

impl ShaderDialect {
    /// Detects the dialect from the leading `#version` directive.
    ///
    /// Returns the offending directive text when it names a version neither
    /// dialect covers.
    pub fn detect(source: &str) -> Result<Self, String> {
        let Some((line, _)) = leading_version_directive(source) else {
            return Ok(ShaderDialect::Legacy);
        };
        let mut words = line.trim_start_matches('#').split_whitespace().skip(1);
        match (words.next(), words.next()) {
            (Some("100"), None) => Ok(ShaderDialect::Legacy),
            (Some("300"), Some("es")) => Ok(ShaderDialect::Es300),
            _ => Err(line.to_owned()),
        }
    }
}

impl fmt::Display for ShaderDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderDialect::Legacy => write!(f, "GLSL ES 1.00"),
            ShaderDialect::Es300 => write!(f, "GLSL ES 3.00"),
        }
    }
}

fn is_version_directive(trimmed: &str) -> bool {
    trimmed
        .strip_prefix('#')
        .is_some_and(|rest| rest.trim_start().starts_with("version"))
}

/// Finds a `#version` directive on the first meaningful line, returning the trimmed
/// directive and the byte offset just past its line.
fn leading_version_directive(source: &str) -> Option<(&str, usize)> {
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        let trimmed = line.trim();
        offset += line.len();
        if trimmed.is_empty() || trimmed.starts_with("//") {
            continue;
        }
        return is_version_directive(trimmed).then_some((trimmed, offset));
    }
    None
}

/// Produces the source of one stage by injecting its selection macro.
///
/// The macro lands right after a leading `#version` directive so that the directive
/// stays the first line and later `#extension` directives keep working.
///
/// ```
/// use kiln_core::renderer::api::{preprocess, ShaderStage};
///
/// let src = "#version 300 es\nvoid main() {}\n";
/// assert_eq!(
///     preprocess(src, ShaderStage::Vertex),
///     "#version 300 es\n#define VERTEX_SHADER\nvoid main() {}\n"
/// );
/// ```
pub fn preprocess(source: &str, stage: ShaderStage) -> String {
    let define = stage.define();
    match leading_version_directive(source) {
        Some((_, end)) => {
            let (head, tail) = source.split_at(end);
            let sep = if head.ends_with('\n') { "" } else { "\n" };
            format!("{head}{sep}#define {define}\n{tail}")
        }
        None => format!("#define {define}\n{source}"),
    }
}

/// The two stage sources derived from one dual-stage program source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSources {
    /// Source with `VERTEX_SHADER` defined.
    pub vertex: String,
    /// Source with `FRAGMENT_SHADER` defined.
    pub fragment: String,
}

impl StageSources {
    /// Splits a dual-stage source into its two stage sources.
    pub fn split(source: &str) -> Self {
        Self {
            vertex: preprocess(source, ShaderStage::Vertex),
            fragment: preprocess(source, ShaderStage::Fragment),
        }
    }

    /// The source of the given stage.
    pub fn get(&self, stage: ShaderStage) -> &str {
        match stage {
            ShaderStage::Vertex => &self.vertex,
            ShaderStage::Fragment => &self.fragment,
        }
    }
}

/// A GLSL data type as seen by attribute and uniform reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlslType {
    /// `float`
    Float,
    /// `vec2`
    Vec2,
    /// `vec3`
    Vec3,
    /// `vec4`
    Vec4,
    /// `int`
    Int,
    /// `ivec2`
    IVec2,
    /// `ivec3`
    IVec3,
    /// `ivec4`
    IVec4,
    /// `bool`
    Bool,
    /// `mat2`
    Mat2,
    /// `mat3`
    Mat3,
    /// `mat4`
    Mat4,
    /// `sampler2D`
    Sampler2D,
    /// `samplerCube`
    SamplerCube,
}

impl GlslType {
    /// Parses a GLSL type keyword.
    pub fn from_glsl(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "float" => GlslType::Float,
            "vec2" => GlslType::Vec2,
            "vec3" => GlslType::Vec3,
            "vec4" => GlslType::Vec4,
            "int" => GlslType::Int,
            "ivec2" => GlslType::IVec2,
            "ivec3" => GlslType::IVec3,
            "ivec4" => GlslType::IVec4,
            "bool" => GlslType::Bool,
            "mat2" => GlslType::Mat2,
            "mat3" => GlslType::Mat3,
            "mat4" => GlslType::Mat4,
            "sampler2D" => GlslType::Sampler2D,
            "samplerCube" => GlslType::SamplerCube,
            _ => return None,
        })
    }

    /// The GLSL keyword of this type.
    pub const fn keyword(self) -> &'static str {
        match self {
            GlslType::Float => "float",
            GlslType::Vec2 => "vec2",
            GlslType::Vec3 => "vec3",
            GlslType::Vec4 => "vec4",
            GlslType::Int => "int",
            GlslType::IVec2 => "ivec2",
            GlslType::IVec3 => "ivec3",
            GlslType::IVec4 => "ivec4",
            GlslType::Bool => "bool",
            GlslType::Mat2 => "mat2",
            GlslType::Mat3 => "mat3",
            GlslType::Mat4 => "mat4",
            GlslType::Sampler2D => "sampler2D",
            GlslType::SamplerCube => "samplerCube",
        }
    }

    /// Returns `true` for sampler types.
    pub const fn is_sampler(self) -> bool {
        matches!(self, GlslType::Sampler2D | GlslType::SamplerCube)
    }
}

impl fmt::Display for GlslType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A value written to a program uniform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// An `int`, `bool` or sampler unit.
    Int(i32),
    /// An `ivec2`.
    IVec2([i32; 2]),
    /// An `ivec3`.
    IVec3([i32; 3]),
    /// An `ivec4`.
    IVec4([i32; 4]),
    /// A `float`.
    Float(f32),
    /// A `vec2`.
    Vec2([f32; 2]),
    /// A `vec3`.
    Vec3([f32; 3]),
    /// A `vec4`.
    Vec4([f32; 4]),
    /// A column-major `mat2`.
    Mat2([f32; 4]),
    /// A column-major `mat3`.
    Mat3([f32; 9]),
    /// A `mat4`.
    Mat4(Mat4),
}

impl UniformValue {
    /// The GLSL type this value naturally maps to.
    pub const fn glsl_type(&self) -> GlslType {
        match self {
            UniformValue::Int(_) => GlslType::Int,
            UniformValue::IVec2(_) => GlslType::IVec2,
            UniformValue::IVec3(_) => GlslType::IVec3,
            UniformValue::IVec4(_) => GlslType::IVec4,
            UniformValue::Float(_) => GlslType::Float,
            UniformValue::Vec2(_) => GlslType::Vec2,
            UniformValue::Vec3(_) => GlslType::Vec3,
            UniformValue::Vec4(_) => GlslType::Vec4,
            UniformValue::Mat2(_) => GlslType::Mat2,
            UniformValue::Mat3(_) => GlslType::Mat3,
            UniformValue::Mat4(_) => GlslType::Mat4,
        }
    }

    /// Whether this value may be written to a uniform declared as `ty`.
    ///
    /// Integers are also accepted by `bool` and sampler uniforms.
    pub fn is_compatible_with(&self, ty: GlslType) -> bool {
        match self {
            UniformValue::Int(_) => {
                matches!(ty, GlslType::Int | GlslType::Bool) || ty.is_sampler()
            }
            other => other.glsl_type() == ty,
        }
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        UniformValue::Vec4(v)
    }
}

impl From<crate::math::Vec3> for UniformValue {
    fn from(v: crate::math::Vec3) -> Self {
        UniformValue::Vec3([v.x, v.y, v.z])
    }
}

impl From<crate::math::Vec4> for UniformValue {
    fn from(v: crate::math::Vec4) -> Self {
        UniformValue::Vec4([v.x, v.y, v.z, v.w])
    }
}

impl From<Mat4> for UniformValue {
    fn from(m: Mat4) -> Self {
        UniformValue::Mat4(m)
    }
}

/// A vertex attribute of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    /// Attribute name.
    pub name: String,
    /// Resolved location.
    pub location: u32,
    /// Declared type.
    pub ty: GlslType,
}

/// A uniform of a linked program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformInfo {
    /// Uniform name, without any array suffix.
    pub name: String,
    /// Declared type.
    pub ty: GlslType,
    /// Number of array elements; `1` for non-arrays.
    pub array_len: u32,
}

/// A uniform block bound to a binding point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlockBinding {
    /// Block name.
    pub name: String,
    /// Binding point the block reads from.
    pub binding: u32,
}

/// What a linked program exposes: attribute locations, uniform types and block bindings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramReflection {
    /// Active attributes.
    pub attributes: Vec<AttributeInfo>,
    /// Active uniforms outside of blocks.
    pub uniforms: Vec<UniformInfo>,
    /// Declared uniform blocks the program exposes, with their bindings.
    pub uniform_blocks: Vec<UniformBlockBinding>,
}

impl ProgramReflection {
    /// Looks up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The location of the named attribute.
    pub fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attribute(name).map(|a| a.location)
    }

    /// Looks up a uniform by name.
    pub fn uniform(&self, name: &str) -> Option<&UniformInfo> {
        self.uniforms.iter().find(|u| u.name == name)
    }

    /// The binding point of the named uniform block.
    pub fn block_binding(&self, name: &str) -> Option<u32> {
        self.uniform_blocks
            .iter()
            .find(|b| b.name == name)
            .map(|b| b.binding)
    }
}

/// A descriptor used to create a program from one dual-stage source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDescriptor<'a> {
    /// An optional debug label.
    pub label: Option<Cow<'a, str>>,
    /// The dual-stage source.
    pub source: Cow<'a, str>,
    /// Uniform blocks to bind, as `(block name, binding index)` pairs.
    pub uniform_blocks: Vec<(Cow<'a, str>, u32)>,
}

impl<'a> ProgramDescriptor<'a> {
    /// A descriptor for the given source, without uniform blocks.
    pub fn new(source: impl Into<Cow<'a, str>>) -> Self {
        Self {
            label: None,
            source: source.into(),
            uniform_blocks: Vec::new(),
        }
    }

    /// Sets the debug label.
    pub fn with_label(mut self, label: impl Into<Cow<'a, str>>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Requests that `name` be bound to `binding` after link.
    pub fn with_uniform_block(mut self, name: impl Into<Cow<'a, str>>, binding: u32) -> Self {
        self.uniform_blocks.push((name.into(), binding));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUAL: &str = "#version 300 es\n#ifdef VERTEX_SHADER\nvoid main() {}\n#endif\n";

    #[test]
    fn define_is_injected_after_version() {
        let stages = StageSources::split(DUAL);
        assert!(stages.vertex.starts_with("#version 300 es\n#define VERTEX_SHADER\n"));
        assert!(stages.fragment.starts_with("#version 300 es\n#define FRAGMENT_SHADER\n"));
        assert!(stages.vertex.ends_with(&DUAL["#version 300 es\n".len()..]));
    }

    #[test]
    fn define_is_prepended_without_version() {
        let src = "precision mediump float;\nvoid main() {}";
        assert_eq!(
            preprocess(src, ShaderStage::Fragment),
            format!("#define FRAGMENT_SHADER\n{src}")
        );
    }

    #[test]
    fn version_only_source_gets_a_separating_newline() {
        assert_eq!(
            preprocess("#version 100", ShaderStage::Vertex),
            "#version 100\n#define VERTEX_SHADER\n"
        );
    }

    #[test]
    fn leading_blank_lines_and_comments_are_skipped() {
        let src = "\n// header\n#version 300 es\nvoid main() {}\n";
        let out = preprocess(src, ShaderStage::Vertex);
        assert_eq!(
            out,
            "\n// header\n#version 300 es\n#define VERTEX_SHADER\nvoid main() {}\n"
        );
        assert_eq!(ShaderDialect::detect(src), Ok(ShaderDialect::Es300));
    }

    #[test]
    fn dialect_detection() {
        assert_eq!(ShaderDialect::detect("void main() {}"), Ok(ShaderDialect::Legacy));
        assert_eq!(ShaderDialect::detect("#version 100\n"), Ok(ShaderDialect::Legacy));
        assert_eq!(ShaderDialect::detect("#version 300 es\n"), Ok(ShaderDialect::Es300));
        assert_eq!(
            ShaderDialect::detect("#version 330 core\n"),
            Err("#version 330 core".to_owned())
        );
    }

    #[test]
    fn integer_values_are_accepted_by_samplers_and_bools() {
        let unit = UniformValue::from(2);
        assert!(unit.is_compatible_with(GlslType::Sampler2D));
        assert!(unit.is_compatible_with(GlslType::Bool));
        assert!(!unit.is_compatible_with(GlslType::Float));
        assert!(UniformValue::from(Mat4::IDENTITY).is_compatible_with(GlslType::Mat4));
        assert!(!UniformValue::from([1.0, 2.0, 3.0]).is_compatible_with(GlslType::Vec4));
    }
}
