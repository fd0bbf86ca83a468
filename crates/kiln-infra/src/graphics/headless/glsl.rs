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

//! A small GLSL ES front end: preprocessing, global declaration reflection and link checks.
//!
//! It does not type-check function bodies. It does enough to reject what a conforming
//! driver would reject at the declaration level and to reflect what a driver would
//! report, with info logs in the usual `ERROR: 0:<line>: '<token>' : <message>` shape.

use kiln_core::renderer::api::{ApiVersion, AttributeInfo, GlslType, ShaderStage, UniformInfo};
use std::collections::{HashMap, HashSet};

/// Limits and extensions the front end compiles against.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrontEnd {
    pub(crate) version: ApiVersion,
    pub(crate) draw_buffers: bool,
    pub(crate) max_draw_buffers: u32,
    pub(crate) max_vertex_attribs: u32,
}

/// The language version a stage was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LanguageVersion {
    Es100,
    Es300,
}

impl LanguageVersion {
    fn number(self) -> u32 {
        match self {
            LanguageVersion::Es100 => 100,
            LanguageVersion::Es300 => 300,
        }
    }
}

/// A global `in`/`out`/`attribute`/`varying`/`uniform` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Variable {
    pub(crate) name: String,
    pub(crate) ty: GlslType,
    pub(crate) array_len: u32,
    pub(crate) location: Option<u32>,
}

/// What one compiled stage declares.
#[derive(Debug, Clone)]
pub(crate) struct CompiledStage {
    pub(crate) stage: ShaderStage,
    pub(crate) language: LanguageVersion,
    pub(crate) inputs: Vec<Variable>,
    pub(crate) outputs: Vec<Variable>,
    pub(crate) uniforms: Vec<Variable>,
    pub(crate) blocks: Vec<String>,
    pub(crate) has_main: bool,
    pub(crate) info_log: String,
}

/// The interface of a linked program.
#[derive(Debug, Clone)]
pub(crate) struct LinkedProgram {
    pub(crate) attributes: Vec<AttributeInfo>,
    pub(crate) uniforms: Vec<UniformInfo>,
    pub(crate) blocks: Vec<String>,
}

#[derive(Default)]
struct Diagnostics {
    log: String,
    errors: usize,
}

impl Diagnostics {
    fn error(&mut self, line: u32, token: &str, message: &str) {
        self.log
            .push_str(&format!("ERROR: 0:{line}: '{token}' : {message}\n"));
        self.errors += 1;
    }

    fn warning(&mut self, line: u32, token: &str, message: &str) {
        self.log
            .push_str(&format!("WARNING: 0:{line}: '{token}' : {message}\n"));
    }
}

/// Compiles one stage. Returns the verbatim info log on failure.
pub(crate) fn compile(
    stage: ShaderStage,
    source: &str,
    front_end: &FrontEnd,
) -> Result<CompiledStage, String> {
    let mut diag = Diagnostics::default();
    let stripped = strip_comments(source);
    let pre = preprocess(&stripped, front_end, &mut diag);
    let tokens = tokenize(&pre.lines, &mut diag);

    let mut parser = DeclParser {
        stage,
        language: pre.language,
        front_end,
        extensions: &pre.extensions,
        tokens: &tokens,
        pos: 0,
        structs: HashSet::new(),
        consts: HashMap::new(),
        out: CompiledStage {
            stage,
            language: pre.language,
            inputs: Vec::new(),
            outputs: Vec::new(),
            uniforms: Vec::new(),
            blocks: Vec::new(),
            has_main: false,
            info_log: String::new(),
        },
        frag_color: None,
        frag_data: None,
    };
    parser.run(&mut diag);
    parser.check_fragment_outputs(&mut diag);

    if diag.errors > 0 {
        diag.log.push_str(&format!(
            "ERROR: {} compilation errors.  No code generated.\n",
            diag.errors
        ));
        return Err(diag.log);
    }
    let mut out = parser.out;
    out.info_log = diag.log;
    Ok(out)
}

/// Links two compiled stages, assigning attribute locations.
///
/// `bindings` plays the role of pre-link attribute bindings: they apply to attributes
/// without an explicit `layout(location)`.
pub(crate) fn link(
    vertex: &CompiledStage,
    fragment: &CompiledStage,
    bindings: &[(&str, u32)],
    max_vertex_attribs: u32,
) -> Result<LinkedProgram, String> {
    let mut log = String::new();
    let mut fail = |message: String| log.push_str(&format!("ERROR: {message}\n"));

    if vertex.language != fragment.language {
        fail(format!(
            "Shader versions do not match: vertex is {}, fragment is {}",
            vertex.language.number(),
            fragment.language.number()
        ));
    }
    for stage in [vertex, fragment] {
        if !stage.has_main {
            fail(format!("Missing entry point 'main' in the {} shader", stage.stage));
        }
    }

    for input in &fragment.inputs {
        match vertex.outputs.iter().find(|out| out.name == input.name) {
            None => fail(format!(
                "Fragment input '{}' is not written by the vertex shader",
                input.name
            )),
            Some(out) if out.ty != input.ty || out.array_len != input.array_len => fail(format!(
                "Type of varying '{}' differs between shaders",
                input.name
            )),
            Some(_) => {}
        }
    }

    let mut uniforms: Vec<UniformInfo> = Vec::new();
    for var in vertex.uniforms.iter().chain(&fragment.uniforms) {
        match uniforms.iter().position(|u| u.name == var.name) {
            Some(i) if uniforms[i].ty != var.ty || uniforms[i].array_len != var.array_len => {
                fail(format!(
                    "Uniform '{}' differs on type between shaders",
                    var.name
                ))
            }
            Some(_) => {}
            None => uniforms.push(UniformInfo {
                name: var.name.clone(),
                ty: var.ty,
                array_len: var.array_len,
            }),
        }
    }

    let mut blocks: Vec<String> = Vec::new();
    for block in vertex.blocks.iter().chain(&fragment.blocks) {
        if !blocks.contains(block) {
            blocks.push(block.clone());
        }
    }

    let attributes = match assign_attribute_locations(&vertex.inputs, bindings, max_vertex_attribs) {
        Ok(attributes) => attributes,
        Err(message) => {
            fail(message);
            Vec::new()
        }
    };

    if !log.is_empty() {
        return Err(log);
    }
    Ok(LinkedProgram {
        attributes,
        uniforms,
        blocks,
    })
}

fn attribute_slots(ty: GlslType) -> u32 {
    match ty {
        GlslType::Mat2 => 2,
        GlslType::Mat3 => 3,
        GlslType::Mat4 => 4,
        _ => 1,
    }
}

fn claim_slots<'v>(owner: &mut [Option<&'v str>], var: &'v Variable, at: u32) -> Result<(), String> {
    let max = owner.len() as u32;
    let slots = attribute_slots(var.ty);
    if at + slots > max {
        return Err(format!(
            "Attribute '{}' at location {at} exceeds the limit of {max} vertex attributes",
            var.name
        ));
    }
    for slot in at..at + slots {
        if let Some(other) = owner[slot as usize] {
            return Err(format!(
                "Attributes '{other}' and '{}' are bound to the same location {slot}",
                var.name
            ));
        }
    }
    for slot in at..at + slots {
        owner[slot as usize] = Some(&var.name);
    }
    Ok(())
}

fn assign_attribute_locations(
    inputs: &[Variable],
    bindings: &[(&str, u32)],
    max: u32,
) -> Result<Vec<AttributeInfo>, String> {
    let mut owner: Vec<Option<&str>> = vec![None; max as usize];
    let mut placed: Vec<AttributeInfo> = Vec::with_capacity(inputs.len());

    let mut pending = Vec::new();
    for var in inputs {
        let fixed = var.location.or_else(|| {
            bindings
                .iter()
                .find(|(name, _)| *name == var.name)
                .map(|(_, location)| *location)
        });
        match fixed {
            Some(location) => {
                claim_slots(&mut owner, var, location)?;
                placed.push(AttributeInfo {
                    name: var.name.clone(),
                    location,
                    ty: var.ty,
                });
            }
            None => pending.push(var),
        }
    }

    for var in pending {
        let slots = attribute_slots(var.ty) as usize;
        let free = (0..owner.len())
            .find(|&start| {
                start + slots <= owner.len() && owner[start..start + slots].iter().all(Option::is_none)
            })
            .ok_or_else(|| format!("Too many vertex attributes: no room for '{}'", var.name))?;
        claim_slots(&mut owner, var, free as u32)?;
        placed.push(AttributeInfo {
            name: var.name.clone(),
            location: free as u32,
            ty: var.ty,
        });
    }

    placed.sort_by_key(|attr| attr.location);
    Ok(placed)
}

// --- Preprocessor ---

/// Replaces comments with a space, keeping newlines so line numbers survive.
fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('/', Some('/')) => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                out.push(' ');
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                    }
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

struct Line {
    number: u32,
    text: String,
}

struct Preprocessed {
    language: LanguageVersion,
    lines: Vec<Line>,
    extensions: HashSet<String>,
}

struct Conditional {
    parent_active: bool,
    taken: bool,
    active: bool,
    seen_else: bool,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn split_ident(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if !text.starts_with(is_ident_start) {
        return None;
    }
    let end = text.find(|c: char| !is_ident_char(c)).unwrap_or(text.len());
    Some(text.split_at(end))
}

fn preprocess(source: &str, front_end: &FrontEnd, diag: &mut Diagnostics) -> Preprocessed {
    let mut language = LanguageVersion::Es100;
    let mut lines = Vec::new();
    let mut extensions = HashSet::new();
    let mut defines: HashMap<String, String> = HashMap::new();
    defines.insert("GL_ES".into(), "1".into());
    defines.insert("__VERSION__".into(), "100".into());
    let mut stack: Vec<Conditional> = Vec::new();
    let mut seen_content = false;
    let mut last_line = 0;

    for (index, raw) in source.lines().enumerate() {
        let number = index as u32 + 1;
        last_line = number;
        let trimmed = raw.trim();
        let active = stack.last().map_or(true, |c| c.active);

        let Some(directive) = trimmed.strip_prefix('#') else {
            if active && !trimmed.is_empty() {
                seen_content = true;
                lines.push(Line {
                    number,
                    text: expand(raw, &defines, number, &mut Vec::new()),
                });
            }
            continue;
        };
        let directive = directive.trim_start();
        let (name, rest) = split_ident(directive).unwrap_or(("", directive));
        let rest = rest.trim();

        match name {
            "if" | "ifdef" | "ifndef" => {
                let condition = active
                    && match name {
                        "ifdef" => is_defined(rest, &defines, number, diag),
                        "ifndef" => !is_defined(rest, &defines, number, diag),
                        _ => evaluate(rest, &defines, number, diag),
                    };
                stack.push(Conditional {
                    parent_active: active,
                    taken: condition,
                    active: condition,
                    seen_else: false,
                });
            }
            "elif" => match stack.last_mut() {
                None => diag.error(number, "#elif", "unexpected #elif without #if"),
                Some(top) if top.seen_else => diag.error(number, "#elif", "#elif after #else"),
                Some(top) => {
                    let condition = top.parent_active && !top.taken;
                    let condition = condition && evaluate(rest, &defines, number, diag);
                    top.active = condition;
                    top.taken |= condition;
                }
            },
            "else" => match stack.last_mut() {
                None => diag.error(number, "#else", "unexpected #else without #if"),
                Some(top) if top.seen_else => diag.error(number, "#else", "#else after #else"),
                Some(top) => {
                    top.active = top.parent_active && !top.taken;
                    top.taken = true;
                    top.seen_else = true;
                }
            },
            "endif" => {
                if stack.pop().is_none() {
                    diag.error(number, "#endif", "unexpected #endif without #if");
                }
            }
            _ if !active => {}
            "version" => {
                if seen_content {
                    diag.error(
                        number,
                        "#version",
                        "#version directive must occur before anything else, except for comments and white space",
                    );
                } else {
                    let mut words = rest.split_whitespace();
                    match (words.next(), words.next(), words.next()) {
                        (Some("100"), None, None) => language = LanguageVersion::Es100,
                        (Some("300"), Some("es"), None) if front_end.version >= ApiVersion::V2 => {
                            language = LanguageVersion::Es300;
                        }
                        (Some(v), ..) => diag.error(number, v, "version number not supported"),
                        (None, ..) => diag.error(number, "#version", "version number missing"),
                    }
                    defines.insert("__VERSION__".into(), language.number().to_string());
                }
                seen_content = true;
            }
            "define" => {
                seen_content = true;
                let Some((macro_name, body)) = split_ident(rest) else {
                    diag.error(number, "#define", "invalid macro name");
                    continue;
                };
                if macro_name.starts_with("GL_") || macro_name.contains("__") {
                    diag.error(number, macro_name, "macro name is reserved");
                    continue;
                }
                let body = if body.starts_with('(') {
                    // Function-like macros are recorded but not expanded.
                    String::new()
                } else {
                    body.trim().to_owned()
                };
                match defines.get(macro_name) {
                    Some(previous) if *previous != body => {
                        diag.error(number, macro_name, "macro redefined");
                    }
                    _ => {
                        defines.insert(macro_name.to_owned(), body);
                    }
                }
            }
            "undef" => {
                seen_content = true;
                match split_ident(rest) {
                    Some((macro_name, _)) => {
                        defines.remove(macro_name);
                    }
                    None => diag.error(number, "#undef", "invalid macro name"),
                }
            }
            "error" => {
                seen_content = true;
                diag.error(number, "#error", rest);
            }
            "extension" => {
                seen_content = true;
                let Some((ext, behavior)) = rest.split_once(':') else {
                    diag.error(number, "#extension", "invalid extension directive");
                    continue;
                };
                let (ext, behavior) = (ext.trim(), behavior.trim());
                if !matches!(behavior, "require" | "enable" | "warn" | "disable") {
                    diag.error(number, behavior, "invalid extension behavior");
                    continue;
                }
                let supported = match ext {
                    "all" => behavior == "warn" || behavior == "disable",
                    "GL_EXT_draw_buffers" => front_end.draw_buffers && language == LanguageVersion::Es100,
                    "GL_OES_standard_derivatives" => language == LanguageVersion::Es100,
                    _ => false,
                };
                if !supported {
                    if behavior == "require" {
                        diag.error(number, ext, "extension is not supported");
                    } else {
                        diag.warning(number, ext, "extension is not supported");
                    }
                } else if behavior != "disable" {
                    extensions.insert(ext.to_owned());
                }
            }
            "pragma" | "line" | "" => seen_content = true,
            other => diag.error(number, &format!("#{other}"), "invalid directive name"),
        }
    }

    if !stack.is_empty() {
        diag.error(last_line, "#endif", "missing #endif");
    }
    Preprocessed {
        language,
        lines,
        extensions,
    }
}

fn is_defined(rest: &str, defines: &HashMap<String, String>, line: u32, diag: &mut Diagnostics) -> bool {
    match split_ident(rest) {
        Some((name, _)) => defines.contains_key(name),
        None => {
            diag.error(line, rest, "invalid macro name");
            false
        }
    }
}

/// Object-like macro expansion. `active` guards against self reference.
fn expand(text: &str, defines: &HashMap<String, String>, line: u32, active: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(c) = rest.chars().next() {
        if is_ident_start(c) {
            let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
            let (ident, tail) = rest.split_at(end);
            if ident == "__LINE__" {
                out.push_str(&line.to_string());
            } else if let Some(body) = defines.get(ident).filter(|_| !active.iter().any(|a| a == ident)) {
                active.push(ident.to_owned());
                out.push_str(&expand(body, defines, line, active));
                active.pop();
            } else {
                out.push_str(ident);
            }
            rest = tail;
        } else if c.is_ascii_digit() {
            let end = rest
                .find(|c: char| !(is_ident_char(c) || c == '.'))
                .unwrap_or(rest.len());
            out.push_str(&rest[..end]);
            rest = &rest[end..];
        } else {
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
enum ExprToken {
    Number(i64),
    Ident(String),
    Op(&'static str),
}

const EXPR_OPS: [&str; 22] = [
    "||", "&&", "==", "!=", "<=", ">=", "<<", ">>", "+", "-", "*", "/", "%", "<", ">", "!", "~",
    "&", "|", "^", "(", ")",
];

fn tokenize_expr(text: &str) -> Result<Vec<ExprToken>, String> {
    let mut tokens = Vec::new();
    let mut rest = text.trim_start();
    while let Some(c) = rest.chars().next() {
        if is_ident_start(c) {
            let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
            tokens.push(ExprToken::Ident(rest[..end].to_owned()));
            rest = &rest[end..];
        } else if c.is_ascii_digit() {
            let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
            let literal = &rest[..end];
            let value = if let Some(hex) = literal.strip_prefix("0x").or_else(|| literal.strip_prefix("0X")) {
                i64::from_str_radix(hex, 16)
            } else if literal.len() > 1 && literal.starts_with('0') {
                i64::from_str_radix(&literal[1..], 8)
            } else {
                literal.parse()
            };
            tokens.push(ExprToken::Number(
                value.map_err(|_| format!("invalid number '{literal}' in preprocessor expression"))?,
            ));
            rest = &rest[end..];
        } else if let Some(op) = EXPR_OPS.iter().find(|op| rest.starts_with(**op)) {
            tokens.push(ExprToken::Op(*op));
            rest = &rest[op.len()..];
        } else {
            return Err(format!("unexpected '{c}' in preprocessor expression"));
        }
        rest = rest.trim_start();
    }
    Ok(tokens)
}

/// Resolves `defined` and expands macros, leaving only numbers and operators.
fn resolve_expr(
    tokens: Vec<ExprToken>,
    defines: &HashMap<String, String>,
    depth: usize,
) -> Result<Vec<ExprToken>, String> {
    if depth > 32 {
        return Err("macro expansion too deep in preprocessor expression".into());
    }
    let mut out = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        match token {
            ExprToken::Ident(ident) if ident == "defined" => {
                let parenthesized = iter.peek() == Some(&ExprToken::Op("("));
                if parenthesized {
                    iter.next();
                }
                let Some(ExprToken::Ident(name)) = iter.next() else {
                    return Err("'defined' expects a macro name".into());
                };
                if parenthesized && iter.next() != Some(ExprToken::Op(")")) {
                    return Err("missing ')' after 'defined'".into());
                }
                out.push(ExprToken::Number(defines.contains_key(&name) as i64));
            }
            ExprToken::Ident(ident) => match defines.get(&ident) {
                Some(body) => {
                    let body = tokenize_expr(body)?;
                    out.extend(resolve_expr(body, defines, depth + 1)?);
                }
                None => out.push(ExprToken::Number(0)),
            },
            other => out.push(other),
        }
    }
    Ok(out)
}

fn binary_precedence(op: &str) -> Option<u8> {
    Some(match op {
        "||" => 1,
        "&&" => 2,
        "|" => 3,
        "^" => 4,
        "&" => 5,
        "==" | "!=" => 6,
        "<" | ">" | "<=" | ">=" => 7,
        "<<" | ">>" => 8,
        "+" | "-" => 9,
        "*" | "/" | "%" => 10,
        _ => return None,
    })
}

struct ExprParser {
    tokens: Vec<ExprToken>,
    pos: usize,
}

impl ExprParser {
    fn next(&mut self) -> Option<ExprToken> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn peek_op(&self) -> Option<&'static str> {
        match self.tokens.get(self.pos) {
            Some(ExprToken::Op(op)) => Some(*op),
            _ => None,
        }
    }

    fn unary(&mut self) -> Result<i64, String> {
        match self.next() {
            Some(ExprToken::Number(n)) => Ok(n),
            Some(ExprToken::Op("(")) => {
                let value = self.binary(0)?;
                match self.next() {
                    Some(ExprToken::Op(")")) => Ok(value),
                    _ => Err("missing ')' in preprocessor expression".into()),
                }
            }
            Some(ExprToken::Op("!")) => Ok((self.unary()? == 0) as i64),
            Some(ExprToken::Op("-")) => Ok(self.unary()?.wrapping_neg()),
            Some(ExprToken::Op("+")) => self.unary(),
            Some(ExprToken::Op("~")) => Ok(!self.unary()?),
            _ => Err("syntax error in preprocessor expression".into()),
        }
    }

    fn binary(&mut self, min: u8) -> Result<i64, String> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek_op() {
            let Some(prec) = binary_precedence(op).filter(|p| *p > min) else {
                break;
            };
            self.pos += 1;
            let rhs = self.binary(prec)?;
            lhs = match op {
                "||" => ((lhs != 0) || (rhs != 0)) as i64,
                "&&" => ((lhs != 0) && (rhs != 0)) as i64,
                "|" => lhs | rhs,
                "^" => lhs ^ rhs,
                "&" => lhs & rhs,
                "==" => (lhs == rhs) as i64,
                "!=" => (lhs != rhs) as i64,
                "<" => (lhs < rhs) as i64,
                ">" => (lhs > rhs) as i64,
                "<=" => (lhs <= rhs) as i64,
                ">=" => (lhs >= rhs) as i64,
                "<<" => lhs.wrapping_shl(rhs as u32),
                ">>" => lhs.wrapping_shr(rhs as u32),
                "+" => lhs.wrapping_add(rhs),
                "-" => lhs.wrapping_sub(rhs),
                "*" => lhs.wrapping_mul(rhs),
                "/" | "%" if rhs == 0 => {
                    return Err("division by zero in preprocessor expression".into())
                }
                "/" => lhs.wrapping_div(rhs),
                _ => lhs.wrapping_rem(rhs),
            };
        }
        Ok(lhs)
    }
}

fn evaluate(expr: &str, defines: &HashMap<String, String>, line: u32, diag: &mut Diagnostics) -> bool {
    let result = tokenize_expr(expr)
        .and_then(|tokens| resolve_expr(tokens, defines, 0))
        .and_then(|tokens| {
            if tokens.is_empty() {
                return Err("empty preprocessor expression".into());
            }
            let mut parser = ExprParser { tokens, pos: 0 };
            let value = parser.binary(0)?;
            if parser.pos < parser.tokens.len() {
                return Err("unexpected tokens after preprocessor expression".into());
            }
            Ok(value)
        });
    match result {
        Ok(value) => value != 0,
        Err(message) => {
            diag.error(line, "#if", &message);
            false
        }
    }
}

// --- Declarations ---

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Ident(String),
    Number(String),
    Punct(char),
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: u32,
}

impl Token {
    fn text(&self) -> String {
        match &self.tok {
            Tok::Ident(s) | Tok::Number(s) => s.clone(),
            Tok::Punct(c) => c.to_string(),
        }
    }

    fn is_punct(&self, c: char) -> bool {
        self.tok == Tok::Punct(c)
    }

    fn ident(&self) -> Option<&str> {
        match &self.tok {
            Tok::Ident(s) => Some(s),
            _ => None,
        }
    }
}

fn tokenize(lines: &[Line], diag: &mut Diagnostics) -> Vec<Token> {
    let mut tokens = Vec::new();
    for line in lines {
        let mut rest = line.text.as_str();
        while let Some(c) = rest.chars().next() {
            if c.is_whitespace() {
                rest = &rest[c.len_utf8()..];
            } else if is_ident_start(c) {
                let end = rest.find(|c: char| !is_ident_char(c)).unwrap_or(rest.len());
                tokens.push(Token {
                    tok: Tok::Ident(rest[..end].to_owned()),
                    line: line.number,
                });
                rest = &rest[end..];
            } else if c.is_ascii_digit() || (c == '.' && rest[1..].starts_with(|d: char| d.is_ascii_digit())) {
                let mut end = 0;
                let bytes = rest.as_bytes();
                while end < bytes.len() {
                    let b = bytes[end] as char;
                    let exponent_sign = (b == '+' || b == '-')
                        && end > 0
                        && matches!(bytes[end - 1] as char, 'e' | 'E')
                        && !rest.starts_with("0x");
                    if is_ident_char(b) || b == '.' || exponent_sign {
                        end += 1;
                    } else {
                        break;
                    }
                }
                tokens.push(Token {
                    tok: Tok::Number(rest[..end].to_owned()),
                    line: line.number,
                });
                rest = &rest[end..];
            } else if c.is_ascii_punctuation() {
                tokens.push(Token {
                    tok: Tok::Punct(c),
                    line: line.number,
                });
                rest = &rest[1..];
            } else {
                diag.error(line.number, &c.to_string(), "invalid character");
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    tokens
}

const PRECISION_QUALIFIERS: [&str; 3] = ["highp", "mediump", "lowp"];
const INTERPOLATION_QUALIFIERS: [&str; 5] = ["invariant", "flat", "smooth", "centroid", "const"];

/// Built-in types the reflection does not model. Declarations of these are accepted
/// but not reported.
const UNREFLECTED_TYPES: [&str; 16] = [
    "uint", "uvec2", "uvec3", "uvec4", "bvec2", "bvec3", "bvec4", "mat2x3", "mat2x4", "mat3x2",
    "mat3x4", "mat4x2", "mat4x3", "sampler3D", "sampler2DShadow", "sampler2DArray",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    None,
    Const,
    Attribute,
    Varying,
    Uniform,
    In,
    Out,
}

struct DeclParser<'a> {
    stage: ShaderStage,
    language: LanguageVersion,
    front_end: &'a FrontEnd,
    extensions: &'a HashSet<String>,
    tokens: &'a [Token],
    pos: usize,
    structs: HashSet<String>,
    consts: HashMap<String, u32>,
    out: CompiledStage,
    frag_color: Option<u32>,
    frag_data: Option<u32>,
}

impl<'a> DeclParser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn last_line(&self) -> u32 {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |t| t.line)
    }

    fn run(&mut self, diag: &mut Diagnostics) {
        while self.pos < self.tokens.len() {
            let start = self.pos;
            self.external_declaration(diag);
            if self.pos == start {
                self.pos += 1;
            }
        }
    }

    /// Skips to just past the matching closer of the opener at `self.pos`.
    fn skip_balanced(&mut self, open: char, close: char, diag: &mut Diagnostics) -> &'a [Token] {
        let tokens = self.tokens;
        let start = self.pos;
        let line = self.last_line();
        let mut depth = 0usize;
        while let Some(token) = tokens.get(self.pos) {
            self.pos += 1;
            if token.is_punct(open) {
                depth += 1;
            } else if token.is_punct(close) {
                depth -= 1;
                if depth == 0 {
                    return &tokens[start + 1..self.pos - 1];
                }
            }
        }
        diag.error(line, &open.to_string(), &format!("missing '{close}'"));
        &tokens[start..]
    }

    fn skip_statement(&mut self) {
        let mut depth = 0i32;
        while let Some(token) = self.tokens.get(self.pos) {
            self.pos += 1;
            match token.tok {
                Tok::Punct('(') | Tok::Punct('[') | Tok::Punct('{') => depth += 1,
                Tok::Punct(')') | Tok::Punct(']') | Tok::Punct('}') => depth -= 1,
                Tok::Punct(';') if depth <= 0 => return,
                _ => {}
            }
        }
    }

    fn expect_punct(&mut self, c: char, diag: &mut Diagnostics) -> bool {
        match self.peek() {
            Some(token) if token.is_punct(c) => {
                self.pos += 1;
                true
            }
            Some(token) => {
                let (line, text) = (token.line, token.text());
                diag.error(line, &text, "syntax error");
                self.skip_statement();
                false
            }
            None => {
                diag.error(self.last_line(), &c.to_string(), "syntax error: unexpected end of file");
                false
            }
        }
    }

    fn parse_layout(&mut self, diag: &mut Diagnostics) -> Option<u32> {
        let line = self.last_line();
        self.pos += 1;
        if !self.peek().is_some_and(|t| t.is_punct('(')) {
            diag.error(line, "layout", "syntax error");
            return None;
        }
        let inner = self.skip_balanced('(', ')', diag).to_vec();
        if self.language == LanguageVersion::Es100 {
            diag.error(line, "layout", "Illegal use of reserved word");
            return None;
        }
        let mut location = None;
        for (i, token) in inner.iter().enumerate() {
            if token.ident() == Some("location") {
                let value = inner
                    .get(i + 2)
                    .filter(|_| inner.get(i + 1).is_some_and(|t| t.is_punct('=')))
                    .and_then(|t| match &t.tok {
                        Tok::Number(n) => n.parse::<u32>().ok(),
                        _ => None,
                    });
                match value {
                    Some(value) => location = Some(value),
                    None => diag.error(token.line, "location", "invalid layout qualifier value"),
                }
            }
        }
        location
    }

    fn external_declaration(&mut self, diag: &mut Diagnostics) {
        let Some(head) = self.peek().cloned() else {
            return;
        };
        if head.is_punct(';') {
            self.pos += 1;
            return;
        }
        if head.ident() == Some("precision") {
            self.skip_statement();
            return;
        }

        let mut location = None;
        let mut storage = Storage::None;
        loop {
            let Some(token) = self.peek().cloned() else {
                diag.error(head.line, &head.text(), "syntax error: unexpected end of file");
                return;
            };
            let Some(word) = token.ident() else { break };
            let next = match word {
                "layout" => {
                    location = self.parse_layout(diag);
                    continue;
                }
                "attribute" => Storage::Attribute,
                "varying" => Storage::Varying,
                "uniform" => Storage::Uniform,
                "in" => Storage::In,
                "out" => Storage::Out,
                w if INTERPOLATION_QUALIFIERS.contains(&w) => {
                    if w == "const" {
                        storage = Storage::Const;
                    }
                    self.pos += 1;
                    continue;
                }
                w if PRECISION_QUALIFIERS.contains(&w) => {
                    self.pos += 1;
                    continue;
                }
                _ => break,
            };
            self.check_storage(next, &token, diag);
            storage = next;
            self.pos += 1;
        }

        let Some(type_token) = self.peek().cloned() else {
            diag.error(head.line, &head.text(), "syntax error: unexpected end of file");
            return;
        };
        let Some(type_name) = type_token.ident().map(str::to_owned) else {
            diag.error(type_token.line, &type_token.text(), "syntax error");
            self.skip_statement();
            return;
        };

        if type_name == "struct" {
            self.pos += 1;
            if let Some(name) = self.peek().and_then(Token::ident).map(str::to_owned) {
                self.structs.insert(name);
                self.pos += 1;
            }
            if self.peek().is_some_and(|t| t.is_punct('{')) {
                self.skip_balanced('{', '}', diag);
            }
            self.skip_statement();
            return;
        }

        // `uniform Name { ... } instance;`
        if storage == Storage::Uniform
            && self.peek_at(1).is_some_and(|t| t.is_punct('{'))
            && GlslType::from_glsl(&type_name).is_none()
        {
            self.pos += 1;
            if self.language == LanguageVersion::Es100 {
                diag.error(type_token.line, &type_name, "uniform blocks require GLSL ES 3.00");
            } else if !self.out.blocks.contains(&type_name) {
                self.out.blocks.push(type_name);
            }
            self.skip_balanced('{', '}', diag);
            self.skip_statement();
            return;
        }

        self.pos += 1;
        let known = GlslType::from_glsl(&type_name);
        let declarable = known.is_some()
            || type_name == "void"
            || self.structs.contains(&type_name)
            || UNREFLECTED_TYPES.contains(&type_name.as_str());
        if !declarable {
            diag.error(type_token.line, &type_name, "syntax error");
            self.skip_statement();
            return;
        }

        // Function prototype or definition.
        if self.peek().and_then(Token::ident).is_some() && self.peek_at(1).is_some_and(|t| t.is_punct('(')) {
            let name = self.peek().and_then(Token::ident).unwrap_or_default().to_owned();
            self.pos += 1;
            self.skip_balanced('(', ')', diag);
            if self.peek().is_some_and(|t| t.is_punct('{')) {
                let body = self.skip_balanced('{', '}', diag).to_vec();
                self.check_body(&body, diag);
                if name == "main" {
                    if self.out.has_main {
                        diag.error(type_token.line, "main", "function already has a body");
                    }
                    self.out.has_main = true;
                }
            } else {
                self.expect_punct(';', diag);
            }
            return;
        }

        self.declarators(storage, known, location, &type_token, diag);
    }

    fn check_storage(&self, storage: Storage, token: &Token, diag: &mut Diagnostics) {
        let word = token.text();
        match (storage, self.language, self.stage) {
            (Storage::Attribute | Storage::Varying, LanguageVersion::Es300, _) => {
                diag.error(token.line, &word, "Illegal use of reserved word");
            }
            (Storage::Attribute, LanguageVersion::Es100, ShaderStage::Fragment) => {
                diag.error(token.line, &word, "supported in vertex shaders only");
            }
            (Storage::In | Storage::Out, LanguageVersion::Es100, _) => {
                diag.error(token.line, &word, "storage qualifier supported in GLSL ES 3.00 only");
            }
            _ => {}
        }
    }

    fn array_len(&mut self, diag: &mut Diagnostics) -> u32 {
        if !self.peek().is_some_and(|t| t.is_punct('[')) {
            return 1;
        }
        let line = self.last_line();
        let inner = self.skip_balanced('[', ']', diag).to_vec();
        let value = match inner.as_slice() {
            [Token { tok: Tok::Number(n), .. }] => n.trim_end_matches(['u', 'U']).parse::<u32>().ok(),
            [Token { tok: Tok::Ident(name), .. }] => self.consts.get(name).copied(),
            _ => None,
        };
        match value {
            Some(len) if len > 0 => len,
            _ => {
                diag.error(line, "[", "array size must be a positive constant integer expression");
                1
            }
        }
    }

    fn declarators(
        &mut self,
        storage: Storage,
        ty: Option<GlslType>,
        location: Option<u32>,
        type_token: &Token,
        diag: &mut Diagnostics,
    ) {
        loop {
            let Some(name_token) = self.peek().cloned() else {
                diag.error(type_token.line, &type_token.text(), "syntax error: unexpected end of file");
                return;
            };
            let Some(name) = name_token.ident().map(str::to_owned) else {
                diag.error(name_token.line, &name_token.text(), "syntax error");
                self.skip_statement();
                return;
            };
            if name.starts_with("gl_") {
                diag.error(name_token.line, &name, "reserved built-in name");
            }
            self.pos += 1;
            let array_len = self.array_len(diag);

            if self.peek().is_some_and(|t| t.is_punct('=')) {
                self.pos += 1;
                if storage == Storage::Const {
                    if let (Some(GlslType::Int), Some(Tok::Number(n))) = (ty, self.peek().map(|t| t.tok.clone())) {
                        if let Ok(value) = n.parse::<u32>() {
                            self.consts.insert(name.clone(), value);
                        }
                    }
                } else if matches!(storage, Storage::Uniform | Storage::In | Storage::Out | Storage::Attribute | Storage::Varying) {
                    diag.error(name_token.line, &name, "cannot initialize this type of qualifier");
                }
                let mut depth = 0i32;
                while let Some(token) = self.peek() {
                    match token.tok {
                        Tok::Punct('(') | Tok::Punct('[') | Tok::Punct('{') => depth += 1,
                        Tok::Punct(')') | Tok::Punct(']') | Tok::Punct('}') => depth -= 1,
                        Tok::Punct(',') | Tok::Punct(';') if depth == 0 => break,
                        _ => {}
                    }
                    self.pos += 1;
                }
            }

            if let Some(ty) = ty {
                self.record(storage, Variable { name, ty, array_len, location }, name_token.line, diag);
            }

            match self.peek() {
                Some(token) if token.is_punct(',') => self.pos += 1,
                _ => {
                    self.expect_punct(';', diag);
                    return;
                }
            }
        }
    }

    fn record(&mut self, storage: Storage, var: Variable, line: u32, diag: &mut Diagnostics) {
        let list = match (storage, self.stage) {
            (Storage::Uniform, _) => &mut self.out.uniforms,
            (Storage::Attribute | Storage::In, ShaderStage::Vertex) => {
                if var.ty.is_sampler() || matches!(var.ty, GlslType::Bool) {
                    diag.error(line, var.ty.keyword(), "vertex attributes cannot be of this type");
                }
                &mut self.out.inputs
            }
            (Storage::Varying, ShaderStage::Vertex) | (Storage::Out, ShaderStage::Vertex) => &mut self.out.outputs,
            (Storage::Varying, ShaderStage::Fragment) | (Storage::In, ShaderStage::Fragment) => &mut self.out.inputs,
            (Storage::Out, ShaderStage::Fragment) => &mut self.out.outputs,
            _ => return,
        };
        if list.iter().any(|existing| existing.name == var.name) {
            diag.error(line, &var.name, "redefinition");
            return;
        }
        list.push(var);
    }

    fn check_body(&mut self, body: &[Token], diag: &mut Diagnostics) {
        for (i, token) in body.iter().enumerate() {
            let Some(word) = token.ident() else { continue };
            let called = body.get(i + 1).is_some_and(|t| t.is_punct('('));
            match (word, self.language) {
                ("gl_FragColor" | "gl_FragData", LanguageVersion::Es300) => {
                    diag.error(token.line, word, "undeclared identifier");
                }
                ("gl_FragColor" | "gl_FragData", _) if self.stage == ShaderStage::Vertex => {
                    diag.error(token.line, word, "undeclared identifier");
                }
                ("gl_FragColor", _) => self.frag_color = Some(token.line),
                ("gl_FragData", _) => {
                    self.frag_data = Some(token.line);
                    let index = match (body.get(i + 1), body.get(i + 2), body.get(i + 3)) {
                        (Some(open), Some(Token { tok: Tok::Number(n), .. }), Some(close))
                            if open.is_punct('[') && close.is_punct(']') =>
                        {
                            n.parse::<u32>().ok()
                        }
                        _ => None,
                    };
                    let limit = if self.extensions.contains("GL_EXT_draw_buffers") {
                        self.front_end.max_draw_buffers
                    } else {
                        1
                    };
                    if let Some(index) = index.filter(|index| *index >= limit) {
                        diag.error(
                            token.line,
                            "gl_FragData",
                            &format!("array index {index} out of range (limit {limit})"),
                        );
                    }
                }
                ("texture2D" | "textureCube", LanguageVersion::Es300) if called => {
                    diag.error(token.line, word, "no matching overloaded function found");
                }
                ("gl_Position", _) if self.stage == ShaderStage::Fragment => {
                    diag.error(token.line, word, "undeclared identifier");
                }
                _ => {}
            }
        }
    }

    fn check_fragment_outputs(&mut self, diag: &mut Diagnostics) {
        if self.stage != ShaderStage::Fragment {
            return;
        }
        let line = self.last_line();
        if let (Some(_), Some(data_line)) = (self.frag_color, self.frag_data) {
            diag.error(data_line, "gl_FragData", "cannot use both gl_FragData and gl_FragColor");
        }
        let outputs = &self.out.outputs;
        if outputs.len() > 1 && outputs.iter().any(|o| o.location.is_none()) {
            diag.error(
                line,
                "out",
                "must explicitly specify all locations when using multiple fragment outputs",
            );
        }
        let mut used = HashSet::new();
        for output in outputs {
            let first = output.location.unwrap_or(0);
            for slot in first..first + output.array_len {
                if slot >= self.front_end.max_draw_buffers {
                    diag.error(line, &output.name, "output location must be less than MAX_DRAW_BUFFERS");
                } else if !used.insert(slot) {
                    diag.error(line, &output.name, "conflicting output locations");
                }
            }
        }
    }
}
