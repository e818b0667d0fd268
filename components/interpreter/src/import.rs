//! Module import runtime
//!
//! Resolves `import` paths to script sources, native libraries, directory
//! packages, `core:` modules or precompiled archive entries, and memoizes the
//! resulting Module values in the [`Context`](crate::Context).

use crate::object::Value;
use crate::vm::Vm;
use core_types::{BondError, BondResult};
use std::collections::HashMap;
use std::env::consts::{DLL_PREFIX, DLL_SUFFIX};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, info};

/// Script source extension.
pub const SOURCE_EXTENSION: &str = "bd";

const NATIVE_EXTENSIONS: [&str; 3] = ["so", "dll", "dylib"];

/// What an import path resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleKind {
    /// A `.bd` source file
    Script,
    /// A shared library exporting `bond_module_init`
    Native,
    /// A directory whose entries become the module's attributes
    Package,
}

/// A resolved import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    /// Canonical path of the module
    pub path: PathBuf,
    pub kind: ModuleKind,
}

fn kind_of(path: &Path) -> ModuleKind {
    if path.is_dir() {
        return ModuleKind::Package;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if NATIVE_EXTENSIONS.contains(&ext) => ModuleKind::Native,
        _ => ModuleKind::Script,
    }
}

fn resolved(path: PathBuf) -> Option<ResolvedModule> {
    let path = path.canonicalize().ok()?;
    let kind = kind_of(&path);
    Some(ResolvedModule { path, kind })
}

/// Resolve an import path.
///
/// Candidates are tried in order: native library in `lib_path`, native
/// library relative to `importer_dir` then the working directory, script in
/// `lib_path`, script relative to `importer_dir` then the working directory,
/// and finally the path as written (a directory or an already-suffixed
/// file).
pub fn resolve_import(lib_path: &Path, importer_dir: Option<&Path>, path: &str) -> Option<ResolvedModule> {
    let mut bases: Vec<PathBuf> = Vec::new();
    if let Some(dir) = importer_dir {
        bases.push(dir.to_path_buf());
    }
    bases.push(PathBuf::from("."));

    let native = format!("{}{}{}", DLL_PREFIX, path, DLL_SUFFIX);
    let script = format!("{}.{}", path, SOURCE_EXTENSION);

    let mut candidates = vec![lib_path.join(&native)];
    candidates.extend(bases.iter().map(|base| base.join(&native)));
    candidates.push(lib_path.join(&script));
    candidates.extend(bases.iter().map(|base| base.join(&script)));
    if let Some(found) = candidates.into_iter().find(|c| c.is_file()) {
        return resolved(found);
    }

    bases
        .iter()
        .map(|base| base.join(path))
        .chain(std::iter::once(lib_path.join(path)))
        .find(|candidate| {
            candidate.is_dir()
                || (candidate.is_file()
                    && candidate
                        .extension()
                        .and_then(|e| e.to_str())
                        .map_or(false, |e| {
                            e == SOURCE_EXTENSION || NATIVE_EXTENSIONS.contains(&e)
                        }))
        })
        .and_then(resolved)
}

fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl<'ctx> Vm<'ctx> {
    /// Import `path` relative to the running frame.
    pub fn import(&mut self, path: &str) -> BondResult<Value> {
        if path.starts_with("core:") {
            return self.import_core(path);
        }
        let importer_dir = self
            .frames
            .last()
            .map(|frame| frame.current_span().module_id)
            .and_then(|id| self.ctx.source_path(id))
            .and_then(Path::parent)
            .map(Path::to_path_buf);
        let resolved = resolve_import(self.ctx.lib_path(), importer_dir.as_deref(), path)
            .ok_or_else(|| BondError::import_error(format!("unable to find module {}", path)))?;
        self.load_resolved(&resolved)
    }

    fn import_core(&mut self, name: &str) -> BondResult<Value> {
        if let Some(module) = self.ctx.get_module(name) {
            return Ok(module);
        }
        let init = *self
            .ctx
            .native_modules
            .get(name)
            .ok_or_else(|| BondError::import_error(format!("unknown core module {}", name)))?;
        init(self.ctx_mut(), name);
        self.ctx
            .get_module(name)
            .ok_or_else(|| BondError::import_error(format!("core module {} did not register", name)))
    }

    fn load_resolved(&mut self, resolved: &ResolvedModule) -> BondResult<Value> {
        let key = resolved.path.to_string_lossy().into_owned();
        if let Some(module) = self.ctx.get_module(&key) {
            return Ok(module);
        }
        if !self.ctx.loading.insert(key.clone()) {
            return Err(BondError::import_error(format!("circular import of {}", key)));
        }
        debug!(path = %key, kind = ?resolved.kind, "loading module");
        let result = match resolved.kind {
            ModuleKind::Script => self.load_script(&resolved.path, &key),
            ModuleKind::Native => {
                let alias = module_name(&resolved.path);
                self.ctx.load_library(&resolved.path, &alias)
            }
            ModuleKind::Package => self.load_package(&resolved.path, &key),
        };
        self.ctx.loading.remove(&key);
        let module = result?;
        self.ctx.add_module(&key, module);
        info!(path = %key, "imported module");
        Ok(module)
    }

    fn load_script(&mut self, path: &Path, key: &str) -> BondResult<Value> {
        let source = fs::read_to_string(path)
            .map_err(|e| BondError::import_error(format!("unable to read {}: {}", key, e)))?;
        let compiler = self
            .ctx
            .compiler()
            .ok_or_else(|| BondError::import_error("no compiler installed for script imports"))?;
        let module_id = self.ctx.register_source(path);
        let code = compiler.compile_module(&source, module_id).map_err(|diagnostics| {
            let details: Vec<String> = diagnostics.iter().map(ToString::to_string).collect();
            BondError::import_error(format!(
                "unable to compile module {}: {}",
                key,
                details.join("; ")
            ))
        })?;
        self.run_module(Rc::new(code), &module_name(path), key)
    }

    fn load_package(&mut self, dir: &Path, key: &str) -> BondResult<Value> {
        let exports = self.ctx.string_map(HashMap::new());
        self.pin(exports);
        let result = self.fill_package(dir, exports);
        self.unpin(exports);
        result?;
        Ok(self.ctx.module(&module_name(dir), key, exports))
    }

    fn fill_package(&mut self, dir: &Path, exports: Value) -> BondResult<()> {
        let entries = fs::read_dir(dir)
            .map_err(|e| BondError::import_error(format!("unable to read {}: {}", dir.display(), e)))?;
        let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
        paths.sort();
        for path in paths {
            let is_module = path.is_dir()
                || path
                    .extension()
                    .and_then(|e| e.to_str())
                    .map_or(false, |e| e == SOURCE_EXTENSION || NATIVE_EXTENSIONS.contains(&e));
            if !is_module {
                continue;
            }
            let Some(entry) = resolved(path) else { continue };
            let module = self.load_resolved(&entry)?;
            let alias = module_name(&entry.path);
            self.ctx.map_insert(exports, &alias, module)?;
        }
        Ok(())
    }

    /// Run module code in a nested VM; its globals become the exports.
    fn run_module(&mut self, code: Rc<bytecode_system::Code>, name: &str, path: &str) -> BondResult<Value> {
        let roots = self.root_values();
        self.ctx.park(roots);
        let result = {
            let globals = self.ctx.string_map(HashMap::new());
            let mut nested = Vm::new(&mut *self.ctx);
            nested.pin(globals);
            nested.run_with_globals(code, globals).map(|_| globals)
        };
        self.ctx.unpark();
        let globals = result.map_err(|e| {
            BondError::import_error(format!("unable to import module {}: {}", path, e))
        })?;
        Ok(self.ctx.module(name, path, globals))
    }

    /// Run precompiled module `id` of the loaded archive, at most once.
    pub fn import_precompiled(&mut self, id: u32) -> BondResult<Value> {
        if let Some(module) = self.ctx.precompiled_modules.get(&id) {
            return Ok(*module);
        }
        let code = self.ctx.precompiled_code(id).ok_or_else(|| {
            BondError::import_error(format!("precompiled module {} is not loaded", id))
        })?;
        let key = format!("<archive>:{}", id);
        if !self.ctx.loading.insert(key.clone()) {
            return Err(BondError::import_error(format!("circular import of {}", key)));
        }
        let result = self.run_module(code, &format!("module{}", id), &key);
        self.ctx.loading.remove(&key);
        let module = result?;
        self.ctx.precompiled_modules.insert(id, module);
        Ok(module)
    }
}
