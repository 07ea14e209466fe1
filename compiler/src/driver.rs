use std::{
    fs::{self, File},
    io::{self, BufWriter},
    path::{Path, PathBuf},
};

use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};

use crate::{
    compilation_engine::CompilationEngine,
    error::Result,
    token_xml_engine::TokenXmlEngine,
    tokenizer::Tokenizer,
    vm_compilation_engine::VmCompilationEngine,
};

pub type Sink = BufWriter<File>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Emit {
    /// VM instructions, `<Class>.vm`
    Vm,
    /// Token listing, `<Class>T.xml`
    Tokens,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    pub emit: Emit,
    pub out_dir: Option<PathBuf>,
}

pub struct UnitReport {
    pub source: PathBuf,
    pub result: Result<PathBuf>,
}

/// A single `.jack` file, or every `.jack` file directly inside a directory.
pub fn find_units(input: &Path) -> io::Result<Vec<PathBuf>> {
    if input.is_file() {
        return Ok(vec![input.to_owned()]);
    }
    let mut units = Vec::new();
    for entry in fs::read_dir(input)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|e| e == "jack") {
            units.push(path);
        }
    }
    units.sort();
    Ok(units)
}

pub fn output_path<E: CompilationEngine<Sink>>(
    source: &Path,
    out_dir: Option<&Path>,
) -> PathBuf {
    let mut path = match out_dir {
        Some(dir) => dir.to_owned(),
        None => source.parent().map(Path::to_owned).unwrap_or_default(),
    };
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.push(format!(
        "{stem}{}.{}",
        E::output_suffix(),
        E::output_extension()
    ));
    path
}

/// Scans and compiles one unit. A failed unit leaves no output file behind.
pub fn compile_unit<E: CompilationEngine<Sink>>(
    tokenizer: &Tokenizer,
    source: &Path,
    out_dir: Option<&Path>,
) -> Result<PathBuf> {
    let tokens = tokenizer.tokenize(source)?;
    let out_path = output_path::<E>(source, out_dir);
    let out = BufWriter::new(File::create(&out_path)?);
    match E::compile(tokens, out) {
        Ok(_) => Ok(out_path),
        Err(e) => {
            if let Err(rm) = fs::remove_file(&out_path) {
                log::warn!("cannot remove partial output {}: {rm}", out_path.display());
            }
            Err(e)
        }
    }
}

/// Compiles every unit found under `config.input`, in parallel. Each unit
/// gets its own engine, so one failure does not affect the others.
pub fn run(config: &Config) -> io::Result<Vec<UnitReport>> {
    let units = find_units(&config.input)?;
    if let Some(dir) = &config.out_dir {
        fs::create_dir_all(dir)?;
    }
    let tokenizer = Tokenizer::new();
    let out_dir = config.out_dir.as_deref();
    let reports: Vec<UnitReport> = units
        .par_iter()
        .map(|source| {
            let result = match config.emit {
                Emit::Vm => compile_unit::<VmCompilationEngine<Sink>>(&tokenizer, source, out_dir),
                Emit::Tokens => compile_unit::<TokenXmlEngine<Sink>>(&tokenizer, source, out_dir),
            };
            UnitReport {
                source: source.clone(),
                result,
            }
        })
        .collect();
    Ok(reports)
}
