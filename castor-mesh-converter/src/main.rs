use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use castor3d::{
    backend::BackendRegistry,
    binary::{save_mesh, MESH_EXTENSION},
    parse::SceneFileParser,
    scene::Scene,
    Engine, EngineConfig,
};
use pico_args::Arguments;

const USAGE: &str = "\
Converts the meshes of a scene file to binary mesh files.

Usage: castor-mesh-converter FILE [-o NAME]

  FILE       scene file declaring the meshes
  -o NAME    output file name, without extension. Defaults to the mesh name.
";

#[derive(Debug, PartialEq)]
struct Options {
    input: PathBuf,
    output: Option<String>,
}

/// Returns `None` when only the usage should be printed.
fn parse_args(args: Vec<OsString>) -> Result<Option<Options>> {
    let mut args = Arguments::from_vec(args);
    if args.contains(["-h", "--help"]) {
        return Ok(None);
    }
    let output: Option<String> = args.opt_value_from_str(["-o", "--output"])?;
    let input: Option<PathBuf> = args.opt_free_from_str()?;
    let remaining = args.finish();
    if !remaining.is_empty() {
        log::warn!("Ignoring extra arguments {:?}", remaining);
    }
    match input {
        Some(input) => Ok(Some(Options { input, output })),
        None => Ok(None),
    }
}

/// Mesh names come from the scene file and must not leave the output
/// directory.
fn escape_mesh_name(mesh: &str) -> String {
    mesh.chars()
        .map(|c| if std::path::is_separator(c) || c == ':' { '_' } else { c })
        .collect()
}

/// Files land beside the scene file. With several meshes a given name is
/// suffixed by each mesh's name.
fn output_path(directory: &Path, output: Option<&str>, mesh: &str, mesh_count: usize) -> PathBuf {
    let mesh = escape_mesh_name(mesh);
    let stem = match output {
        Some(output) if mesh_count > 1 => format!("{}-{}", output, mesh),
        Some(output) => output.to_owned(),
        None => mesh,
    };
    directory.join(format!("{}.{}", stem, MESH_EXTENSION))
}

fn convert(options: &Options) -> Result<Vec<PathBuf>> {
    // Scene files may only be loaded once a render system exists.
    let backends = BackendRegistry::with_builtin();
    let techniques = castor3d_routine::builtin_techniques();
    let mut engine = Engine::new(EngineConfig::default(), &backends, &techniques).context("No usable renderer")?;

    let name = options
        .input
        .file_stem()
        .map_or_else(|| "converted".into(), |stem| stem.to_string_lossy());
    let (scene, report) = SceneFileParser::new().parse_file(Scene::new(name.as_ref()), &options.input)?;
    for diagnostic in &report.diagnostics {
        eprintln!("{}: {}", report.source, diagnostic);
    }
    if report.has_errors() {
        bail!("{} couldn't be parsed", options.input.display());
    }

    let meshes: Vec<_> = scene.meshes().collect();
    if meshes.is_empty() {
        bail!("{} declares no mesh", options.input.display());
    }
    let directory = options.input.parent().unwrap_or_else(|| Path::new(""));
    let mut written = Vec::with_capacity(meshes.len());
    for mesh in &meshes {
        let path = output_path(directory, options.output.as_deref(), &mesh.name, meshes.len());
        if written.contains(&path) {
            bail!("mesh {:?} would overwrite {}", mesh.name, path.display());
        }
        save_mesh(mesh, &path)?;
        written.push(path);
    }

    engine.cleanup();
    Ok(written)
}

fn main() {
    env_logger::init();

    let options = match parse_args(std::env::args_os().skip(1).collect()) {
        Ok(Some(options)) => options,
        Ok(None) => {
            eprint!("{}", USAGE);
            return;
        }
        Err(error) => {
            eprintln!("{}\n\n{}", error, USAGE);
            return;
        }
    };

    match convert(&options) {
        Ok(written) => {
            for path in written {
                eprintln!("Wrote {}", path.display());
            }
        }
        Err(error) => eprintln!("Conversion failed: {:#}", error),
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::{output_path, parse_args, Options};

    fn args(args: &[&str]) -> Vec<std::ffi::OsString> {
        args.iter().map(Into::into).collect()
    }

    #[test]
    fn arguments() {
        assert_eq!(
            parse_args(args(&["scene.cscn", "-o", "out"])).unwrap(),
            Some(Options {
                input: PathBuf::from("scene.cscn"),
                output: Some("out".into()),
            })
        );
        assert_eq!(
            parse_args(args(&["-o", "out", "scene.cscn"])).unwrap().unwrap().output.as_deref(),
            Some("out")
        );
        assert_eq!(parse_args(args(&[])).unwrap(), None);
        assert_eq!(parse_args(args(&["--help", "scene.cscn"])).unwrap(), None);
        assert!(parse_args(args(&["scene.cscn", "-o"])).is_err());
    }

    #[test]
    fn output_names() {
        let dir = Path::new("meshes");
        assert_eq!(output_path(dir, None, "cube", 1), Path::new("meshes/cube.cmsh"));
        assert_eq!(output_path(dir, Some("box"), "cube", 1), Path::new("meshes/box.cmsh"));
        assert_eq!(output_path(dir, Some("box"), "cube", 2), Path::new("meshes/box-cube.cmsh"));
    }

    #[test]
    fn dotted_names_keep_their_suffix() {
        let dir = Path::new("meshes");
        let first = output_path(dir, None, "level.1", 2);
        let second = output_path(dir, None, "level.2", 2);
        assert_ne!(first, second);
        assert_eq!(first, Path::new("meshes/level.1.cmsh"));
        assert_eq!(output_path(dir, Some("out.v2"), "cube", 1), Path::new("meshes/out.v2.cmsh"));
    }

    #[test]
    fn mesh_names_stay_in_the_output_directory() {
        let dir = Path::new("meshes");
        let path = output_path(dir, None, "../escape", 1);
        assert_eq!(path.parent(), Some(dir));
        assert_eq!(path, Path::new("meshes/.._escape.cmsh"));
        assert_eq!(output_path(dir, Some("box"), "a/b", 2).parent(), Some(dir));
    }
}
