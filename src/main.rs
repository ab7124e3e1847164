//! `trajectory-render mesh.ply atlas_dir [mirrors.json] [trajectory] [intrinsics]`
//!
//! Writes `frameNNNNNN.exr` and `depthNNNNNN.png` into the working directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail, ensure};
use log::info;

use trajectory_render::{
    CameraPose, ConsoleProgress, FrameOrchestrator, Intrinsics, Mesh, MeshRenderer,
    PlanarMirrorRenderer, RenderConfig, RenderResult, TrajectoryReader, load_mirror_surfaces,
    read_intrinsics,
};

const USAGE: &str = "usage: trajectory-render mesh.ply /path/to/atlases [mirrorFile] \
                     [/path/to/openCVCameraFile] [/path/to/intrinsicMatrixFile]";

#[derive(Debug, PartialEq)]
struct Args {
    mesh: PathBuf,
    atlas_dir: PathBuf,
    mirrors: Option<PathBuf>,
    trajectory: Option<PathBuf>,
    intrinsics: Option<PathBuf>,
}

impl Args {
    /// Parse positional arguments, program name excluded.
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let args: Vec<PathBuf> = args.into_iter().map(PathBuf::from).collect();
        ensure!((2..=5).contains(&args.len()), "{USAGE}");
        let mut args = args.into_iter();
        let (Some(mesh), Some(atlas_dir)) = (args.next(), args.next()) else {
            bail!("{USAGE}");
        };
        Ok(Self {
            mesh,
            atlas_dir,
            mirrors: args.next(),
            trajectory: args.next(),
            intrinsics: args.next(),
        })
    }

    /// Fail before rendering if any named input is missing.
    fn check_inputs(&self) -> Result<()> {
        let optional = [&self.mirrors, &self.trajectory, &self.intrinsics];
        for path in [&self.mesh, &self.atlas_dir]
            .into_iter()
            .chain(optional.into_iter().flatten())
        {
            ensure!(path.exists(), "{} does not exist", path.display());
        }
        ensure!(
            self.atlas_dir.is_dir(),
            "{} is not a directory",
            self.atlas_dir.display()
        );
        Ok(())
    }
}

type Poses = Box<dyn Iterator<Item = RenderResult<CameraPose>>>;

fn load_trajectory(path: Option<&Path>) -> Result<(usize, Poses)> {
    match path {
        Some(path) => {
            let reader = TrajectoryReader::from_file(path)
                .with_context(|| format!("reading trajectory {}", path.display()))?;
            Ok((reader.frame_count(), Box::new(reader)))
        }
        None => {
            info!("no trajectory file, rendering the default pose");
            Ok((1, Box::new(std::iter::once(Ok(CameraPose::DEFAULT)))))
        }
    }
}

fn run(args: Args) -> Result<()> {
    args.check_inputs()?;

    let intrinsics = match &args.intrinsics {
        Some(path) => read_intrinsics(path)
            .with_context(|| format!("reading intrinsics {}", path.display()))?,
        None => {
            info!("no intrinsics file, using defaults");
            Intrinsics::default()
        }
    };
    let config = RenderConfig::new().with_intrinsics(intrinsics);
    config.validate()?;

    let mesh = Mesh::load(&args.mesh)
        .with_context(|| format!("loading mesh {}", args.mesh.display()))?;
    info!(
        "atlases in {} are not sampled, shading with vertex colors",
        args.atlas_dir.display()
    );

    let surfaces = match &args.mirrors {
        Some(path) => load_mirror_surfaces(path)
            .with_context(|| format!("reading mirrors {}", path.display()))?,
        None => Vec::new(),
    };
    let mirrors = PlanarMirrorRenderer::from_surfaces(&surfaces, config.width(), config.height())
        .context("setting up mirrors")?;

    let (frame_count, poses) = load_trajectory(args.trajectory.as_deref())?;
    let mut orchestrator = FrameOrchestrator::new(
        config,
        MeshRenderer::new(mesh),
        mirrors,
        ConsoleProgress::stdout(),
    )?;
    let summary = orchestrator.run(frame_count, poses)?;
    info!("wrote {} files", summary.file_count());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let result = Args::parse(std::env::args().skip(1)).and_then(run);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
