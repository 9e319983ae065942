//! Plain-text dataset directories.
//!
//! A dataset directory holds four whitespace-separated text files. `#`
//! starts a comment and blank lines are ignored.
//!
//! - `calib.txt`: `image_width image_height fx fy cx cy`
//! - `landmarks.txt`: a record count N, then N records `id x y z`
//! - `poses.txt`: a record count N, then N records `id` followed by the 16
//!   entries of the row-major camera-to-world matrix, whose rotation block
//!   must be orthonormal with determinant +1
//! - `measurements.txt`: records `frame_id landmark_id u v`, any order

use crate::camera::{CameraModel, Calibration};
use crate::dataset::Dataset;
use crate::geometry::Measurement;
use crate::keys::{LandmarkId, PoseId};
use crate::math::{Point3, Pose3};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use visam_solver::math3d::Vec3;

pub const CALIB_FILE: &str = "calib.txt";
pub const LANDMARKS_FILE: &str = "landmarks.txt";
pub const POSES_FILE: &str = "poses.txt";
pub const MEASUREMENTS_FILE: &str = "measurements.txt";

/// Tolerance on the homogeneous row `0 0 0 1` of a pose matrix.
const HOMOGENEOUS_TOLERANCE: f64 = 1e-6;

/// `true` when the upper-left 3x3 block of `m` is a proper rotation.
fn is_rotation(m: &[[f64; 4]; 4]) -> bool {
    for i in 0..3 {
        for j in 0..3 {
            let dot: f64 = (0..3).map(|k| m[i][k] * m[j][k]).sum();
            let expected = if i == j { 1.0 } else { 0.0 };
            if (dot - expected).abs() > HOMOGENEOUS_TOLERANCE {
                return false;
            }
        }
    }
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    det > 0.0
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}:{line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
    #[error("{}: header announces {expected} records, found {found}", .path.display())]
    Count {
        path: PathBuf,
        expected: usize,
        found: usize,
    },
    #[error("{}:{line}: duplicate id {id}", .path.display())]
    Duplicate { path: PathBuf, line: usize, id: u32 },
    #[error("{}: no data", .path.display())]
    Empty { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, InputError>;

/// Non-comment lines of a file, with 1-based line numbers.
struct Records {
    path: PathBuf,
    lines: Vec<(usize, Vec<String>)>,
}

impl Records {
    fn read(path: PathBuf) -> Result<Self> {
        let text = fs::read_to_string(&path).map_err(|source| InputError::Io {
            path: path.clone(),
            source,
        })?;
        let lines = text
            .lines()
            .enumerate()
            .filter_map(|(i, line)| {
                let content = line.split('#').next().unwrap_or("");
                let fields: Vec<String> = content.split_whitespace().map(str::to_owned).collect();
                (!fields.is_empty()).then_some((i + 1, fields))
            })
            .collect();
        Ok(Self { path, lines })
    }

    fn parse_error(&self, line: usize, message: impl Into<String>) -> InputError {
        InputError::Parse {
            path: self.path.clone(),
            line,
            message: message.into(),
        }
    }

    fn field<T: FromStr>(
        &self,
        line: usize,
        fields: &[String],
        index: usize,
        what: &str,
    ) -> Result<T> {
        let raw = fields
            .get(index)
            .ok_or_else(|| self.parse_error(line, format!("missing {}", what)))?;
        raw.parse()
            .map_err(|_| self.parse_error(line, format!("invalid {} '{}'", what, raw)))
    }

    fn expect_len(&self, line: usize, fields: &[String], n: usize) -> Result<()> {
        if fields.len() != n {
            return Err(self.parse_error(
                line,
                format!("expected {} fields, found {}", n, fields.len()),
            ));
        }
        Ok(())
    }

    fn duplicate(&self, line: usize, id: u32) -> InputError {
        InputError::Duplicate {
            path: self.path.clone(),
            line,
            id,
        }
    }

    /// Split off the leading record-count line.
    fn counted(&self) -> Result<&[(usize, Vec<String>)]> {
        let ((line, fields), rest) = self.lines.split_first().ok_or_else(|| InputError::Empty {
            path: self.path.clone(),
        })?;
        self.expect_len(*line, fields, 1)?;
        let expected: usize = self.field(*line, fields, 0, "record count")?;
        if rest.len() != expected {
            return Err(InputError::Count {
                path: self.path.clone(),
                expected,
                found: rest.len(),
            });
        }
        Ok(rest)
    }
}

pub fn read_calibration(path: &Path) -> Result<CameraModel> {
    let records = Records::read(path.to_path_buf())?;
    let (line, fields) = records.lines.first().ok_or_else(|| InputError::Empty {
        path: path.to_path_buf(),
    })?;
    records.expect_len(*line, fields, 6)?;
    let v: Vec<f64> = (0..6)
        .map(|i| records.field(*line, fields, i, "calibration value"))
        .collect::<Result<_>>()?;
    if records.lines.len() > 1 {
        return Err(records.parse_error(records.lines[1].0, "unexpected extra record"));
    }
    if v[2] <= 0.0 || v[3] <= 0.0 {
        return Err(records.parse_error(*line, "focal lengths must be positive"));
    }

    Ok(CameraModel {
        calibration: Calibration::new(v[2], v[3], 0.0, v[4], v[5]),
        image_width: v[0],
        image_height: v[1],
    })
}

pub fn read_landmarks(path: &Path) -> Result<BTreeMap<LandmarkId, Point3>> {
    let records = Records::read(path.to_path_buf())?;
    let rest = records.counted()?;
    let mut out = BTreeMap::new();
    for (line, fields) in rest {
        records.expect_len(*line, fields, 4)?;
        let id = LandmarkId(records.field(*line, fields, 0, "landmark id")?);
        let p = Vec3::new(
            records.field(*line, fields, 1, "x")?,
            records.field(*line, fields, 2, "y")?,
            records.field(*line, fields, 3, "z")?,
        );
        if out.insert(id, p).is_some() {
            return Err(records.duplicate(*line, id.0));
        }
    }
    Ok(out)
}

pub fn read_poses(path: &Path) -> Result<BTreeMap<PoseId, Pose3>> {
    let records = Records::read(path.to_path_buf())?;
    let rest = records.counted()?;
    let mut out = BTreeMap::new();
    for (line, fields) in rest {
        records.expect_len(*line, fields, 17)?;
        let id = PoseId(records.field(*line, fields, 0, "pose id")?);
        let mut m = [[0.0_f64; 4]; 4];
        for (i, entry) in m.iter_mut().flatten().enumerate() {
            *entry = records.field(*line, fields, i + 1, "matrix entry")?;
        }
        let bottom = [0.0, 0.0, 0.0, 1.0];
        if m[3]
            .iter()
            .zip(bottom)
            .any(|(a, b)| (a - b).abs() > HOMOGENEOUS_TOLERANCE)
        {
            return Err(records.parse_error(*line, "last matrix row must be 0 0 0 1"));
        }
        if !is_rotation(&m) {
            return Err(records.parse_error(*line, "rotation block is not orthonormal"));
        }
        if out.insert(id, Pose3::from_matrix_rows([m[0], m[1], m[2]])).is_some() {
            return Err(records.duplicate(*line, id.0));
        }
    }
    Ok(out)
}

/// Measurement records in file order.
pub fn read_measurements(path: &Path) -> Result<Vec<(PoseId, Measurement)>> {
    let records = Records::read(path.to_path_buf())?;
    let mut out = Vec::with_capacity(records.lines.len());
    for (line, fields) in &records.lines {
        records.expect_len(*line, fields, 4)?;
        let frame = PoseId(records.field(*line, fields, 0, "frame id")?);
        let landmark = LandmarkId(records.field(*line, fields, 1, "landmark id")?);
        let u = records.field(*line, fields, 2, "u")?;
        let v = records.field(*line, fields, 3, "v")?;
        out.push((frame, Measurement::new(landmark, u, v)));
    }
    Ok(out)
}

/// Load all four tables from `dir`.
pub fn load_dataset(dir: &Path) -> Result<Dataset> {
    let camera = read_calibration(&dir.join(CALIB_FILE))?;
    let mut dataset = Dataset::new(camera);
    dataset.landmarks = read_landmarks(&dir.join(LANDMARKS_FILE))?;
    dataset.poses = read_poses(&dir.join(POSES_FILE))?;

    for (frame, m) in read_measurements(&dir.join(MEASUREMENTS_FILE))? {
        dataset.measurements.entry(frame).or_default().push(m);
    }

    log::info!(
        "loaded {}: {} landmarks, {} poses, {} frames, {} measurements",
        dir.display(),
        dataset.landmarks.len(),
        dataset.poses.len(),
        dataset.frame_count(),
        dataset.measurement_count()
    );
    Ok(dataset)
}

fn write_file(path: PathBuf, text: &str) -> Result<()> {
    fs::write(&path, text).map_err(|source| InputError::Io { path, source })
}

/// Write `dataset` in the format `load_dataset` reads.
pub fn write_dataset(dir: &Path, dataset: &Dataset) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| InputError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let cam = &dataset.camera;
    let k = &cam.calibration;
    write_file(
        dir.join(CALIB_FILE),
        &format!(
            "# width height fx fy cx cy\n{} {} {} {} {} {}\n",
            cam.image_width, cam.image_height, k.fx, k.fy, k.cx, k.cy
        ),
    )?;

    let mut text = format!("{}\n", dataset.landmarks.len());
    for (id, p) in &dataset.landmarks {
        let _ = writeln!(text, "{} {} {} {}", id.0, p.x, p.y, p.z);
    }
    write_file(dir.join(LANDMARKS_FILE), &text)?;

    let mut text = format!("{}\n", dataset.poses.len());
    for (id, pose) in &dataset.poses {
        let _ = write!(text, "{}", id.0);
        for row in pose.to_matrix_rows() {
            for v in row {
                let _ = write!(text, " {}", v);
            }
        }
        let _ = writeln!(text, " 0 0 0 1");
    }
    write_file(dir.join(POSES_FILE), &text)?;

    let mut text = String::from("# frame landmark u v\n");
    for (frame, measurements) in &dataset.measurements {
        for m in measurements {
            let _ = writeln!(text, "{} {} {} {}", frame.0, m.landmark.0, m.pixel.u, m.pixel.v);
        }
    }
    write_file(dir.join(MEASUREMENTS_FILE), &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, text: &str) {
        fs::write(dir.path().join(name), text).unwrap();
    }

    fn minimal(dir: &TempDir) {
        write(dir, CALIB_FILE, "640 480 500 500 320 240\n");
        write(dir, LANDMARKS_FILE, "2\n10 0 0 5\n20 1 0 5 # right\n");
        write(
            dir,
            POSES_FILE,
            "# id, then 4x4 row-major\n1\n0 1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1\n",
        );
    }

    #[test]
    fn measurements_keep_file_order_within_frame() {
        let dir = TempDir::new().unwrap();
        minimal(&dir);
        write(
            &dir,
            MEASUREMENTS_FILE,
            "0 20 420 240\n\n0 10 320 240\n",
        );

        let dataset = load_dataset(dir.path()).unwrap();
        let frame = &dataset.measurements[&PoseId(0)];
        assert_eq!(frame[0].landmark, LandmarkId(20));
        assert_eq!(frame[1].landmark, LandmarkId(10));
        assert_abs_diff_eq!(frame[0].pixel.u, 420.0);
        assert_eq!(dataset.camera.calibration.skew, 0.0);
    }

    #[test]
    fn frames_are_grouped_and_sorted() {
        let dir = TempDir::new().unwrap();
        minimal(&dir);
        write(&dir, MEASUREMENTS_FILE, "2 10 1 1\n0 10 2 2\n2 20 3 3\n");

        let dataset = load_dataset(dir.path()).unwrap();
        let frames: Vec<_> = dataset.frames().map(|(f, m)| (f, m.len())).collect();
        assert_eq!(frames, vec![(PoseId(0), 1), (PoseId(2), 2)]);
    }

    #[test]
    fn malformed_record_reports_line() {
        let dir = TempDir::new().unwrap();
        minimal(&dir);
        write(&dir, MEASUREMENTS_FILE, "0 10 1 1\n0 ten 1 1\n");

        let err = load_dataset(dir.path()).unwrap_err();
        match err {
            InputError::Parse { line, message, .. } => {
                assert_eq!(line, 2);
                assert!(message.contains("landmark id"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn count_mismatch_is_rejected() {
        let dir = TempDir::new().unwrap();
        minimal(&dir);
        write(&dir, LANDMARKS_FILE, "3\n10 0 0 5\n");
        write(&dir, MEASUREMENTS_FILE, "");

        let err = load_dataset(dir.path()).unwrap_err();
        assert!(matches!(err, InputError::Count { expected: 3, found: 1, .. }));
    }

    #[test]
    fn duplicate_landmark_is_rejected() {
        let dir = TempDir::new().unwrap();
        minimal(&dir);
        write(&dir, LANDMARKS_FILE, "2\n10 0 0 5\n10 1 0 5\n");
        write(&dir, MEASUREMENTS_FILE, "");

        let err = load_dataset(dir.path()).unwrap_err();
        assert!(matches!(err, InputError::Duplicate { id: 10, line: 3, .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = load_dataset(dir.path()).unwrap_err();
        assert!(matches!(err, InputError::Io { .. }));
        assert!(err.to_string().contains(CALIB_FILE));
    }

    #[test]
    fn non_rigid_bottom_row_is_rejected() {
        let dir = TempDir::new().unwrap();
        minimal(&dir);
        write(
            &dir,
            POSES_FILE,
            "1\n0 1 0 0 0 0 1 0 0 0 0 1 0 0 0 1 1\n",
        );
        write(&dir, MEASUREMENTS_FILE, "");

        let err = load_dataset(dir.path()).unwrap_err();
        assert!(matches!(err, InputError::Parse { line: 2, .. }));
    }

    #[test]
    fn scaled_or_mirrored_rotation_is_rejected() {
        for matrix in [
            "2 0 0 0 0 2 0 0 0 0 2 0 0 0 0 1",
            "1 0.1 0 0 0 1 0 0 0 0 1 0 0 0 0 1",
            "-1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 1",
        ] {
            let dir = TempDir::new().unwrap();
            minimal(&dir);
            write(&dir, POSES_FILE, &format!("1\n0 {matrix}\n"));
            write(&dir, MEASUREMENTS_FILE, "");

            let err = load_dataset(dir.path()).unwrap_err();
            assert!(
                matches!(err, InputError::Parse { line: 2, .. }),
                "{matrix}: {err}"
            );
        }
    }
}
