//! onnxruntime-genai backend, bound at run time through `libloading`.
//!
//! The shared library is opened once when the process starts; failure to
//! open it is the import-failure diagnostic, reported before any model work.
//! Symbols are looked up per call against the C API (`ort_genai_c.h`), so
//! the crate builds and runs its tests without the runtime installed.

use std::ffi::{CStr, CString, c_char, c_void};
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::Arc;

use libloading::{Library, Symbol};

use crate::runtime::{
    Generator, GeneratorParams, Model, RuntimeConfig, RuntimeError, TextGenRuntime, TokenId,
    Tokenizer,
};

/// Environment override for the shared-library location.
pub const LIBRARY_ENV: &str = "ORT_GENAI_LIB";

#[cfg(target_os = "windows")]
const LIBRARY_NAME: &str = "onnxruntime-genai.dll";
#[cfg(target_os = "macos")]
const LIBRARY_NAME: &str = "libonnxruntime-genai.dylib";
#[cfg(all(unix, not(target_os = "macos")))]
const LIBRARY_NAME: &str = "libonnxruntime-genai.so";

type Handle = *mut c_void;
type ResultHandle = *mut c_void;

struct OgaLib {
    lib: Library,
}

impl OgaLib {
    fn open() -> Result<Self, RuntimeError> {
        let path = std::env::var_os(LIBRARY_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(LIBRARY_NAME));
        let lib = unsafe { Library::new(&path) }
            .map_err(|err| RuntimeError::new(format!("{}: {err}", path.display())))?;
        Ok(Self { lib })
    }

    fn sym<T>(&self, name: &'static [u8]) -> Result<Symbol<'_, T>, RuntimeError> {
        unsafe { self.lib.get(name) }.map_err(|err| {
            let name = String::from_utf8_lossy(&name[..name.len().saturating_sub(1)]);
            RuntimeError::new(format!("symbol {name} unavailable: {err}"))
        })
    }

    fn has(&self, name: &'static [u8]) -> bool {
        unsafe { self.lib.get::<unsafe extern "C" fn()>(name) }.is_ok()
    }

    // An OgaResult handle is null on success; otherwise it carries the error
    // text and must be destroyed after reading it.
    fn check(&self, result: ResultHandle) -> Result<(), RuntimeError> {
        if result.is_null() {
            return Ok(());
        }
        let message = self
            .sym::<unsafe extern "C" fn(ResultHandle) -> *const c_char>(b"OgaResultGetError\0")
            .map(|get_error| {
                let raw = unsafe { get_error(result) };
                if raw.is_null() {
                    "unknown runtime error".to_string()
                } else {
                    unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned()
                }
            })
            .unwrap_or_else(|err| err.to_string());
        self.release(b"OgaDestroyResult\0", result);
        Err(RuntimeError::new(message))
    }

    fn release(&self, destroy: &'static [u8], handle: Handle) {
        if handle.is_null() {
            return;
        }
        if let Ok(destroy) = self.sym::<unsafe extern "C" fn(Handle)>(destroy) {
            unsafe { destroy(handle) };
        }
    }

    fn take_string(&self, raw: *const c_char) -> String {
        if raw.is_null() {
            return String::new();
        }
        let text = unsafe { CStr::from_ptr(raw) }.to_string_lossy().into_owned();
        self.release(b"OgaDestroyString\0", raw as Handle);
        text
    }
}

fn c_string(text: &str) -> Result<CString, RuntimeError> {
    CString::new(text).map_err(|err| RuntimeError::new(format!("embedded nul in string: {err}")))
}

pub struct OgaRuntime {
    lib: Arc<OgaLib>,
}

impl OgaRuntime {
    /// Binds the shared library. Failure here means the runtime is not
    /// usable in this environment at all.
    pub fn load() -> Result<Self, RuntimeError> {
        Ok(Self {
            lib: Arc::new(OgaLib::open()?),
        })
    }
}

impl TextGenRuntime for OgaRuntime {
    type Config = OgaConfig;
    type Model = OgaModel;

    fn config(&self, location: &Path) -> Result<OgaConfig, RuntimeError> {
        let c_path = c_string(location.to_string_lossy().as_ref())?;
        let create = self
            .lib
            .sym::<unsafe extern "C" fn(*const c_char, *mut Handle) -> ResultHandle>(
                b"OgaCreateConfig\0",
            )?;
        let mut handle: Handle = ptr::null_mut();
        self.lib.check(unsafe { create(c_path.as_ptr(), &mut handle) })?;
        Ok(OgaConfig {
            lib: self.lib.clone(),
            handle,
        })
    }

    fn load_model(&self, config: OgaConfig) -> Result<OgaModel, RuntimeError> {
        let create = self
            .lib
            .sym::<unsafe extern "C" fn(Handle, *mut Handle) -> ResultHandle>(
                b"OgaCreateModelFromConfig\0",
            )?;
        let mut handle: Handle = ptr::null_mut();
        self.lib.check(unsafe { create(config.handle, &mut handle) })?;
        Ok(OgaModel {
            lib: self.lib.clone(),
            handle,
        })
    }
}

pub struct OgaConfig {
    lib: Arc<OgaLib>,
    handle: Handle,
}

impl RuntimeConfig for OgaConfig {
    fn clear_backends(&mut self) -> Result<(), RuntimeError> {
        let clear = self
            .lib
            .sym::<unsafe extern "C" fn(Handle) -> ResultHandle>(b"OgaConfigClearProviders\0")?;
        self.lib.check(unsafe { clear(self.handle) })
    }

    fn append_backend(&mut self, identifier: &str) -> Result<(), RuntimeError> {
        let c_identifier = c_string(identifier)?;
        let append = self
            .lib
            .sym::<unsafe extern "C" fn(Handle, *const c_char) -> ResultHandle>(
                b"OgaConfigAppendProvider\0",
            )?;
        self.lib
            .check(unsafe { append(self.handle, c_identifier.as_ptr()) })
    }
}

impl Drop for OgaConfig {
    fn drop(&mut self) {
        self.lib.release(b"OgaDestroyConfig\0", self.handle);
    }
}

pub struct OgaModel {
    lib: Arc<OgaLib>,
    handle: Handle,
}

impl Model for OgaModel {
    type Tokenizer = OgaTokenizer;
    type Params = OgaGeneratorParams;
    type Generator = OgaGenerator;

    fn tokenizer(&self) -> Result<OgaTokenizer, RuntimeError> {
        let create = self
            .lib
            .sym::<unsafe extern "C" fn(Handle, *mut Handle) -> ResultHandle>(
                b"OgaCreateTokenizer\0",
            )?;
        let mut handle: Handle = ptr::null_mut();
        self.lib.check(unsafe { create(self.handle, &mut handle) })?;
        Ok(OgaTokenizer {
            lib: self.lib.clone(),
            handle,
        })
    }

    fn generator_params(&self) -> Result<OgaGeneratorParams, RuntimeError> {
        let create = self
            .lib
            .sym::<unsafe extern "C" fn(Handle, *mut Handle) -> ResultHandle>(
                b"OgaCreateGeneratorParams\0",
            )?;
        let mut handle: Handle = ptr::null_mut();
        self.lib.check(unsafe { create(self.handle, &mut handle) })?;
        Ok(OgaGeneratorParams {
            lib: self.lib.clone(),
            handle,
        })
    }

    fn generator(&self, params: OgaGeneratorParams) -> Result<OgaGenerator, RuntimeError> {
        let create = self
            .lib
            .sym::<unsafe extern "C" fn(Handle, Handle, *mut Handle) -> ResultHandle>(
                b"OgaCreateGenerator\0",
            )?;
        let mut handle: Handle = ptr::null_mut();
        self.lib
            .check(unsafe { create(self.handle, params.handle, &mut handle) })?;
        Ok(OgaGenerator {
            lib: self.lib.clone(),
            handle,
        })
    }
}

impl Drop for OgaModel {
    fn drop(&mut self) {
        self.lib.release(b"OgaDestroyModel\0", self.handle);
    }
}

struct OgaSequences {
    lib: Arc<OgaLib>,
    handle: Handle,
}

impl OgaSequences {
    fn new(lib: &Arc<OgaLib>) -> Result<Self, RuntimeError> {
        let create =
            lib.sym::<unsafe extern "C" fn(*mut Handle) -> ResultHandle>(b"OgaCreateSequences\0")?;
        let mut handle: Handle = ptr::null_mut();
        lib.check(unsafe { create(&mut handle) })?;
        Ok(Self {
            lib: lib.clone(),
            handle,
        })
    }

    fn append(&mut self, tokens: &[TokenId]) -> Result<(), RuntimeError> {
        let append = self
            .lib
            .sym::<unsafe extern "C" fn(*const TokenId, usize, Handle) -> ResultHandle>(
                b"OgaAppendTokenSequence\0",
            )?;
        self.lib
            .check(unsafe { append(tokens.as_ptr(), tokens.len(), self.handle) })
    }

    fn tokens(&self, index: usize) -> Result<Vec<TokenId>, RuntimeError> {
        let count = self
            .lib
            .sym::<unsafe extern "C" fn(Handle, usize) -> usize>(
                b"OgaSequencesGetSequenceCount\0",
            )?;
        let data = self
            .lib
            .sym::<unsafe extern "C" fn(Handle, usize) -> *const TokenId>(
                b"OgaSequencesGetSequenceData\0",
            )?;
        let len = unsafe { count(self.handle, index) };
        let raw = unsafe { data(self.handle, index) };
        if raw.is_null() || len == 0 {
            return Ok(Vec::new());
        }
        Ok(unsafe { std::slice::from_raw_parts(raw, len) }.to_vec())
    }
}

impl Drop for OgaSequences {
    fn drop(&mut self) {
        self.lib.release(b"OgaDestroySequences\0", self.handle);
    }
}

pub struct OgaTokenizer {
    lib: Arc<OgaLib>,
    handle: Handle,
}

impl Tokenizer for OgaTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<TokenId>, RuntimeError> {
        let c_text = c_string(text)?;
        let sequences = OgaSequences::new(&self.lib)?;
        let encode = self
            .lib
            .sym::<unsafe extern "C" fn(Handle, *const c_char, Handle) -> ResultHandle>(
                b"OgaTokenizerEncode\0",
            )?;
        self.lib
            .check(unsafe { encode(self.handle, c_text.as_ptr(), sequences.handle) })?;
        sequences.tokens(0)
    }

    fn decode(&self, tokens: &[TokenId]) -> Result<String, RuntimeError> {
        let decode = self
            .lib
            .sym::<unsafe extern "C" fn(
                Handle,
                *const TokenId,
                usize,
                *mut *const c_char,
            ) -> ResultHandle>(b"OgaTokenizerDecode\0")?;
        let mut raw: *const c_char = ptr::null();
        self.lib
            .check(unsafe { decode(self.handle, tokens.as_ptr(), tokens.len(), &mut raw) })?;
        Ok(self.lib.take_string(raw))
    }

    fn apply_chat_template(
        &self,
        messages_json: &str,
        add_generation_prompt: bool,
    ) -> Option<Result<String, RuntimeError>> {
        // Older library builds do not export the template entry point.
        if !self.lib.has(b"OgaTokenizerApplyChatTemplate\0") {
            return None;
        }
        Some(self.apply_chat_template_inner(messages_json, add_generation_prompt))
    }
}

impl OgaTokenizer {
    fn apply_chat_template_inner(
        &self,
        messages_json: &str,
        add_generation_prompt: bool,
    ) -> Result<String, RuntimeError> {
        let c_messages = c_string(messages_json)?;
        let apply = self
            .lib
            .sym::<unsafe extern "C" fn(
                Handle,
                *const c_char,
                *const c_char,
                *const c_char,
                bool,
                *mut *const c_char,
            ) -> ResultHandle>(b"OgaTokenizerApplyChatTemplate\0")?;
        let mut raw: *const c_char = ptr::null();
        // Null template and tools select the model's own chat template.
        self.lib.check(unsafe {
            apply(
                self.handle,
                ptr::null(),
                c_messages.as_ptr(),
                ptr::null(),
                add_generation_prompt,
                &mut raw,
            )
        })?;
        Ok(self.lib.take_string(raw))
    }
}

impl Drop for OgaTokenizer {
    fn drop(&mut self) {
        self.lib.release(b"OgaDestroyTokenizer\0", self.handle);
    }
}

pub struct OgaGeneratorParams {
    lib: Arc<OgaLib>,
    handle: Handle,
}

impl OgaGeneratorParams {
    fn set_number(&mut self, name: &CStr, value: f64) -> Result<(), RuntimeError> {
        let set = self
            .lib
            .sym::<unsafe extern "C" fn(Handle, *const c_char, f64) -> ResultHandle>(
                b"OgaGeneratorParamsSetSearchNumber\0",
            )?;
        self.lib.check(unsafe { set(self.handle, name.as_ptr(), value) })
    }
}

impl GeneratorParams for OgaGeneratorParams {
    fn set_search_options(
        &mut self,
        max_length: usize,
        temperature: f64,
        top_p: f64,
    ) -> Result<(), RuntimeError> {
        self.set_number(c"max_length", max_length as f64)?;
        self.set_number(c"temperature", temperature)?;
        self.set_number(c"top_p", top_p)
    }
}

impl Drop for OgaGeneratorParams {
    fn drop(&mut self) {
        self.lib.release(b"OgaDestroyGeneratorParams\0", self.handle);
    }
}

pub struct OgaGenerator {
    lib: Arc<OgaLib>,
    handle: Handle,
}

impl Generator for OgaGenerator {
    fn append_tokens(&mut self, tokens: &[TokenId]) -> Result<(), RuntimeError> {
        let mut sequences = OgaSequences::new(&self.lib)?;
        sequences.append(tokens)?;
        let append = self
            .lib
            .sym::<unsafe extern "C" fn(Handle, Handle) -> ResultHandle>(
                b"OgaGenerator_AppendTokenSequences\0",
            )?;
        self.lib.check(unsafe { append(self.handle, sequences.handle) })
    }

    fn is_done(&self) -> Result<bool, RuntimeError> {
        let is_done = self
            .lib
            .sym::<unsafe extern "C" fn(Handle) -> bool>(b"OgaGenerator_IsDone\0")?;
        Ok(unsafe { is_done(self.handle) })
    }

    fn generate_next_token(&mut self) -> Result<(), RuntimeError> {
        let step = self
            .lib
            .sym::<unsafe extern "C" fn(Handle) -> ResultHandle>(
                b"OgaGenerator_GenerateNextToken\0",
            )?;
        self.lib.check(unsafe { step(self.handle) })
    }

    fn sequence(&self, index: usize) -> Result<Vec<TokenId>, RuntimeError> {
        let count = self
            .lib
            .sym::<unsafe extern "C" fn(Handle, usize) -> usize>(
                b"OgaGenerator_GetSequenceCount\0",
            )?;
        let data = self
            .lib
            .sym::<unsafe extern "C" fn(Handle, usize) -> *const TokenId>(
                b"OgaGenerator_GetSequenceData\0",
            )?;
        let len = unsafe { count(self.handle, index) };
        let raw = unsafe { data(self.handle, index) };
        if raw.is_null() || len == 0 {
            return Ok(Vec::new());
        }
        Ok(unsafe { std::slice::from_raw_parts(raw, len) }.to_vec())
    }
}

impl Drop for OgaGenerator {
    fn drop(&mut self) {
        self.lib.release(b"OgaDestroyGenerator\0", self.handle);
    }
}
