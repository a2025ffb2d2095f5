use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use erl_core::{Error, LabelId, LabelVolume, Shape3};
use serde::Serialize;
use tracing::{debug, info};

use crate::build::SkeletonSet;
use crate::graph::SkeletonGraph;
use crate::params::SkeletonizeParams;

/// Produces one centerline skeleton per label of a volume.
///
/// Implementations discard connected components smaller than
/// `params.dust_threshold` voxels and return vertex positions as voxel
/// coordinates of `volume`.
pub trait Skeletonizer {
    fn skeletonize(
        &self,
        volume: &LabelVolume,
        params: &SkeletonizeParams,
    ) -> Result<SkeletonSet, Error>;
}

/// Skeletonizes `volume` and assembles the result into one graph.
pub fn skeletonize_graph(
    skeletonizer: &dyn Skeletonizer,
    volume: &LabelVolume,
    params: &SkeletonizeParams,
) -> Result<SkeletonGraph, Error> {
    let set = skeletonizer.skeletonize(volume, params)?;
    check_bounds(&set, volume.shape())?;
    SkeletonGraph::assemble(set)
}

/// Skeletons computed ahead of time and stored as JSON, in the same layout
/// a [`CommandSkeletonizer`] reads from its child process.
#[derive(Debug, Clone)]
pub struct PrecomputedSkeletons {
    path: PathBuf,
}

impl PrecomputedSkeletons {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Skeletonizer for PrecomputedSkeletons {
    fn skeletonize(
        &self,
        _volume: &LabelVolume,
        _params: &SkeletonizeParams,
    ) -> Result<SkeletonSet, Error> {
        let set = load_skeletons(&self.path)?;
        info!(path = %self.path.display(), objects = set.len(), "loaded precomputed skeletons");
        Ok(set)
    }
}

/// Reads a skeleton set from a JSON file.
pub fn load_skeletons(path: &Path) -> Result<SkeletonSet, Error> {
    let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_slice(&data)
        .map_err(|e| Error::Format(format!("parsing skeletons {}: {e}", path.display())))
}

/// Runs an external skeletonization program.
///
/// The child receives `{"params", "shape", "labels"}` as JSON on stdin, with
/// `labels` flattened in `z, y, x` order, and must print a skeleton set as
/// JSON on stdout.
#[derive(Debug, Clone)]
pub struct CommandSkeletonizer {
    program: PathBuf,
    args: Vec<String>,
}

#[derive(Serialize)]
struct SkeletonizeRequest<'a> {
    params: &'a SkeletonizeParams,
    shape: Shape3,
    labels: &'a [LabelId],
}

impl CommandSkeletonizer {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl Skeletonizer for CommandSkeletonizer {
    fn skeletonize(
        &self,
        volume: &LabelVolume,
        params: &SkeletonizeParams,
    ) -> Result<SkeletonSet, Error> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::io(&self.program, e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Skeletonizer("child stdin unavailable".into()))?;
        let request = SkeletonizeRequest {
            params,
            shape: volume.shape(),
            labels: volume.data(),
        };

        debug!(program = %self.program.display(), shape = %volume.shape(), "running skeletonizer");

        // stdin is written from a second thread so a child that streams
        // output before reading all input cannot deadlock on a full pipe.
        let (written, output) = std::thread::scope(|s| {
            let writer = s.spawn(move || -> std::io::Result<()> {
                let mut w = BufWriter::new(stdin);
                serde_json::to_writer(&mut w, &request)?;
                w.flush()
            });
            let output = child.wait_with_output();
            (writer.join(), output)
        });

        let output = output.map_err(|e| Error::io(&self.program, e))?;
        if !output.status.success() {
            return Err(Error::Skeletonizer(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::io(&self.program, e)),
            Err(_) => return Err(Error::Skeletonizer("stdin writer panicked".into())),
        }

        serde_json::from_slice(&output.stdout).map_err(|e| {
            Error::Format(format!(
                "parsing output of {}: {e}",
                self.program.display()
            ))
        })
    }
}

fn check_bounds(set: &SkeletonSet, shape: Shape3) -> Result<(), Error> {
    for (object, skel) in set {
        if let Some((i, v)) = skel
            .vertices
            .iter()
            .enumerate()
            .find(|(_, v)| !shape.contains(**v))
        {
            return Err(Error::Format(format!(
                "skeleton {object}: vertex {i} at {v} lies outside volume {shape}"
            )));
        }
    }
    Ok(())
}
