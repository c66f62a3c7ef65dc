/*
 * resource.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template resources and resolution.
//!
//! A [`Resource`] is a loaded unit of template source together with the
//! identity used to resolve relative references made from inside it.
//! Resolution itself is delegated to [`ResourceResolver`] implementations;
//! the engine only turns a relative reference into a full one (see
//! [`resolve_reference`]) before asking the resolver.

use crate::error::{TemplateError, TemplateResult};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Identity of a resource: a `/`-separated reference such as `"pages/home.twig"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The directory part of this identity, without trailing slash.
    pub fn directory(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A loaded template source.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    id: ResourceId,
    content: String,
}

impl Resource {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(id),
            content: content.into(),
        }
    }

    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Trait for loading template resources.
///
/// Implementations must be safe to share between threads; the engine never
/// mutates a resolver after it has been installed.
pub trait ResourceResolver: Send + Sync {
    /// Load the resource named by a full reference.
    ///
    /// Fails with a resource error when the reference cannot be found or read.
    fn resolve(&self, reference: &str) -> TemplateResult<Resource>;
}

impl<R: ResourceResolver + ?Sized> ResourceResolver for Arc<R> {
    fn resolve(&self, reference: &str) -> TemplateResult<Resource> {
        (**self).resolve(reference)
    }
}

/// Resolver that loads resources from an in-memory map.
///
/// Useful for testing and for templates bundled into the application.
#[derive(Debug, Clone, Default)]
pub struct MemoryResolver {
    templates: HashMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template under a reference.
    pub fn add(&mut self, reference: impl Into<String>, content: impl Into<String>) -> &mut Self {
        self.templates.insert(reference.into(), content.into());
        self
    }

    /// Create a resolver with the given templates.
    pub fn with_templates(
        templates: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        let mut resolver = Self::new();
        for (reference, content) in templates {
            resolver.add(reference, content);
        }
        resolver
    }
}

impl ResourceResolver for MemoryResolver {
    fn resolve(&self, reference: &str) -> TemplateResult<Resource> {
        self.templates
            .get(reference)
            .map(|content| Resource::new(reference, content.clone()))
            .ok_or_else(|| TemplateError::resource(reference, "not found"))
    }
}

/// Resolver that reads resources below a root directory.
///
/// References that would escape the root are rejected.
#[derive(Debug, Clone)]
pub struct FileSystemResolver {
    root: PathBuf,
}

impl FileSystemResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceResolver for FileSystemResolver {
    fn resolve(&self, reference: &str) -> TemplateResult<Resource> {
        let normalized = normalize(reference)
            .ok_or_else(|| TemplateError::resource(reference, "escapes the template root"))?;
        let path = self.root.join(&normalized);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            TemplateError::resource(reference, format!("{}: {}", path.display(), e))
        })?;
        Ok(Resource::new(normalized, content))
    }
}

/// An ordered list of resolvers; the first one that succeeds wins.
#[derive(Clone, Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn ResourceResolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resolver to the end of the chain.
    pub fn with(mut self, resolver: impl ResourceResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl fmt::Debug for ResolverChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverChain")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

impl ResourceResolver for ResolverChain {
    fn resolve(&self, reference: &str) -> TemplateResult<Resource> {
        let mut last_error = None;
        for resolver in &self.resolvers {
            match resolver.resolve(reference) {
                Ok(resource) => return Ok(resource),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| TemplateError::resource(reference, "no resolvers configured")))
    }
}

/// Normalize a `/`-separated reference, folding `.` and `..` segments.
///
/// Returns `None` if the reference climbs above its starting point.
fn normalize(reference: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in reference.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            s => segments.push(s),
        }
    }
    Some(segments.join("/"))
}

/// Turn a reference written inside `base` into a full reference.
///
/// References starting with `./` or `../` are relative to the directory of
/// the including resource; anything else is already a full reference.
pub fn resolve_reference(reference: &str, base: Option<&ResourceId>) -> String {
    let relative = reference.starts_with("./") || reference.starts_with("../");
    match base {
        Some(base) if relative && !base.directory().is_empty() => {
            let joined = format!("{}/{}", base.directory(), reference);
            normalize(&joined).unwrap_or(joined)
        }
        _ if relative => normalize(reference).unwrap_or_else(|| reference.to_string()),
        _ => reference.to_string(),
    }
}
