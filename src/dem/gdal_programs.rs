use std::{
    ffi::{CStr, CString},
    path::Path,
    ptr,
};

use gdal::Dataset;
use libc::{c_char, c_int};

use crate::error::{EtlError, EtlResult};

/// Arguments of a GDAL utility as a NULL terminated C string list. The `CString`s must outlive the
/// pointers.
struct Argv {
    _strings: Vec<CString>,
    pointers: Vec<*mut c_char>,
}

impl Argv {
    fn new(args: &[String]) -> EtlResult<Self> {
        let strings = args
            .iter()
            .map(|arg| {
                CString::new(arg.as_str())
                    .map_err(|_| EtlError::unrecognized(arg, "argument contains a NUL byte"))
            })
            .collect::<EtlResult<Vec<_>>>()?;
        let mut pointers: Vec<*mut c_char> = strings
            .iter()
            .map(|string| string.as_ptr() as *mut c_char)
            .collect();
        pointers.push(ptr::null_mut());
        Ok(Self {
            _strings: strings,
            pointers,
        })
    }

    fn as_mut_ptr(&mut self) -> *mut *mut c_char {
        self.pointers.as_mut_ptr()
    }
}

fn path_to_cstring(path: &Path) -> EtlResult<CString> {
    CString::new(path.to_string_lossy().as_bytes())
        .map_err(|_| EtlError::conversion_failed(path, "path contains a NUL byte"))
}

fn last_gdal_error() -> String {
    unsafe {
        let message = gdal_sys::CPLGetLastErrorMsg();
        if message.is_null() {
            return String::new();
        }
        CStr::from_ptr(message).to_string_lossy().into_owned()
    }
}

/// Run `gdal_translate` with `args` on `source`, writing `destination`.
pub fn translate(source: &Dataset, destination: &Path, args: &[String]) -> EtlResult<Dataset> {
    log::debug!("gdal_translate {} {:?}", args.join(" "), destination);
    let mut argv = Argv::new(args)?;
    let c_destination = path_to_cstring(destination)?;
    unsafe {
        let options = gdal_sys::GDALTranslateOptionsNew(argv.as_mut_ptr(), ptr::null_mut());
        if options.is_null() {
            return Err(EtlError::conversion_failed(destination, last_gdal_error()));
        }
        let mut usage_error: c_int = 0;
        let c_dataset = gdal_sys::GDALTranslate(
            c_destination.as_ptr(),
            source.c_dataset(),
            options,
            &mut usage_error,
        );
        gdal_sys::GDALTranslateOptionsFree(options);
        if c_dataset.is_null() || usage_error != 0 {
            return Err(EtlError::conversion_failed(destination, last_gdal_error()));
        }
        Ok(Dataset::from_c_dataset(c_dataset))
    }
}

/// Run `gdalwarp` with `args` on `source`, writing `destination`.
pub fn warp(source: &Dataset, destination: &Path, args: &[String]) -> EtlResult<Dataset> {
    log::debug!("gdalwarp {} {:?}", args.join(" "), destination);
    let mut argv = Argv::new(args)?;
    let c_destination = path_to_cstring(destination)?;
    unsafe {
        let options = gdal_sys::GDALWarpAppOptionsNew(argv.as_mut_ptr(), ptr::null_mut());
        if options.is_null() {
            return Err(EtlError::conversion_failed(destination, last_gdal_error()));
        }
        let mut usage_error: c_int = 0;
        let mut sources = [source.c_dataset()];
        let c_dataset = gdal_sys::GDALWarp(
            c_destination.as_ptr(),
            ptr::null_mut(),
            1,
            sources.as_mut_ptr(),
            options,
            &mut usage_error,
        );
        gdal_sys::GDALWarpAppOptionsFree(options);
        if c_dataset.is_null() || usage_error != 0 {
            return Err(EtlError::conversion_failed(destination, last_gdal_error()));
        }
        Ok(Dataset::from_c_dataset(c_dataset))
    }
}

/// Arguments are given as `&str`s in the call sites.
pub fn args(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}
