//! CSV reports. Each report type gets its own file, `<directory>/<file_prefix><short_name>.csv`,
//! and one row per [`Context::send_report`](ContextReportExt::send_report) call.
//!
//! Two reports are built in and registered as recompute views: a trajectory report holding one
//! row per grid point of the latest successful recompute, and a summary report with one row per
//! recompute, failures included. Rows a view fails to write are logged and counted in
//! [`report_failures`](ContextReportExt::report_failures).
use std::any::TypeId;
use std::fs::{create_dir_all, File};
use std::path::PathBuf;

use csv::Writer;
use log::{error, trace};
use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::controller::{ContextRecomputeExt, ViewUpdate};
use crate::define_data_plugin;
use crate::define_report;
use crate::error::SirError;
use crate::hashing::HashMap;
use crate::model::{basic_reproduction_number, herd_immunity_threshold};

pub trait Report: 'static {
    fn type_id(&self) -> TypeId;

    /// Writes `self` as one row.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be serialized or written.
    fn serialize(&self, writer: &mut Writer<File>) -> Result<(), SirError>;
}

/// Where report files go and whether existing files may be replaced.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub file_prefix: String,
    pub directory: PathBuf,
    pub overwrite: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            file_prefix: String::new(),
            directory: PathBuf::from("."),
            overwrite: false,
        }
    }
}

impl ReportOptions {
    pub fn file_prefix(&mut self, file_prefix: impl Into<String>) -> &mut ReportOptions {
        self.file_prefix = file_prefix.into();
        self
    }

    pub fn directory(&mut self, directory: impl Into<PathBuf>) -> &mut ReportOptions {
        self.directory = directory.into();
        self
    }

    pub fn overwrite(&mut self, overwrite: bool) -> &mut ReportOptions {
        self.overwrite = overwrite;
        self
    }

    /// The file a report registered as `short_name` is written to.
    #[must_use]
    pub fn path_for(&self, short_name: &str) -> PathBuf {
        self.directory
            .join(format!("{}{short_name}.csv", self.file_prefix))
    }
}

#[derive(Default)]
struct ReportData {
    options: ReportOptions,
    file_writers: HashMap<TypeId, Writer<File>>,
    file_paths: HashMap<TypeId, PathBuf>,
    failures: usize,
}

define_data_plugin!(ReportPlugin, ReportData, ReportData::default());

/// Creates the report file, and any missing parent directories.
fn create_report_file(options: &ReportOptions, short_name: &str) -> Result<File, SirError> {
    let path = options.path_for(short_name);
    if path.exists() && !options.overwrite {
        return Err(SirError::ReportError(format!(
            "{} already exists; pass --force-overwrite to replace it",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    trace!("writing report {short_name} to {}", path.display());
    Ok(File::create(path)?)
}

fn missing_report<T>() -> SirError {
    SirError::ReportError(format!(
        "no report added for {}",
        std::any::type_name::<T>()
    ))
}

fn record_view_write(
    context: &mut Context,
    report: &str,
    sequence: usize,
    written: Result<(), SirError>,
) {
    if let Err(e) = written {
        error!("could not write {report} of recompute {sequence}: {e}");
        context.get_data_mut(ReportPlugin).failures += 1;
    }
}

fn write_rows<T: Report>(
    writer: &mut Writer<File>,
    reports: impl IntoIterator<Item = T>,
) -> Result<(), SirError> {
    for report in reports {
        report.serialize(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// One grid point of one trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryRow {
    pub recompute: usize,
    pub t: f64,
    pub susceptible: f64,
    pub infected: f64,
    pub recovered: f64,
}
define_report!(TrajectoryRow);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecomputeStatus {
    Ok,
    Failed,
}

/// One recompute. Trajectory columns are empty when the recompute failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub recompute: usize,
    pub status: RecomputeStatus,
    pub population: f64,
    pub infection_rate: f64,
    pub recovery_rate: f64,
    pub basic_reproduction_number: f64,
    pub herd_immunity_threshold: f64,
    pub peak_infected: Option<f64>,
    pub peak_time: Option<f64>,
    pub final_recovered: Option<f64>,
    pub attack_rate: Option<f64>,
    pub y_upper_bound: Option<f64>,
}
define_report!(SummaryRow);

impl SummaryRow {
    #[must_use]
    pub fn from_update(update: &ViewUpdate) -> SummaryRow {
        let parameters = &update.parameters;
        let mut row = SummaryRow {
            recompute: update.sequence,
            status: RecomputeStatus::Failed,
            population: parameters.population,
            infection_rate: parameters.infection_rate,
            recovery_rate: parameters.recovery_rate,
            basic_reproduction_number: basic_reproduction_number(
                parameters.infection_rate,
                parameters.recovery_rate,
            ),
            herd_immunity_threshold: herd_immunity_threshold(
                parameters.infection_rate,
                parameters.recovery_rate,
            ),
            peak_infected: None,
            peak_time: None,
            final_recovered: None,
            attack_rate: None,
            y_upper_bound: None,
        };
        if let Ok(output) = &update.outcome {
            let summary = output.result.summary();
            row.status = RecomputeStatus::Ok;
            row.peak_infected = Some(summary.peak_infected);
            row.peak_time = Some(summary.peak_time);
            row.final_recovered = Some(summary.final_state.recovered);
            row.attack_rate = Some(summary.attack_rate);
            row.y_upper_bound = Some(output.y_upper_bound);
        }
        row
    }
}

pub trait ContextReportExt {
    /// Options used by reports registered after this call.
    fn report_options(&mut self) -> &mut ReportOptions;

    /// Opens `<directory>/<file_prefix><short_name>.csv` for rows of type `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists and overwriting is off, or if it cannot be created.
    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), SirError>;

    /// Writes one row to the file registered for `T`.
    ///
    /// # Errors
    ///
    /// Returns an error if no report was added for `T` or the row cannot be written.
    fn send_report<T: Report>(&mut self, report: T) -> Result<(), SirError>;

    /// Writes several rows and flushes once.
    ///
    /// # Errors
    ///
    /// Same as [`send_report`](ContextReportExt::send_report).
    fn send_reports<T: Report>(&mut self, reports: impl IntoIterator<Item = T>)
        -> Result<(), SirError>;

    /// Truncates the file registered for `T` and writes `reports` in its place.
    ///
    /// # Errors
    ///
    /// Same as [`send_report`](ContextReportExt::send_report).
    fn replace_reports<T: Report>(
        &mut self,
        reports: impl IntoIterator<Item = T>,
    ) -> Result<(), SirError>;

    /// Number of times a report view could not write its rows.
    fn report_failures(&self) -> usize;

    /// Registers a [`TrajectoryRow`] report and a view that fills it.
    ///
    /// # Errors
    ///
    /// Same as [`add_report`](ContextReportExt::add_report).
    fn add_trajectory_report(&mut self, short_name: &str) -> Result<(), SirError>;

    /// Registers a [`SummaryRow`] report and a view that fills it.
    ///
    /// # Errors
    ///
    /// Same as [`add_report`](ContextReportExt::add_report).
    fn add_summary_report(&mut self, short_name: &str) -> Result<(), SirError>;
}

impl ContextReportExt for Context {
    fn report_options(&mut self) -> &mut ReportOptions {
        &mut self.get_data_mut(ReportPlugin).options
    }

    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), SirError> {
        let data = self.get_data_mut(ReportPlugin);
        let file = create_report_file(&data.options, short_name)?;
        data.file_writers
            .insert(TypeId::of::<T>(), Writer::from_writer(file));
        data.file_paths
            .insert(TypeId::of::<T>(), data.options.path_for(short_name));
        Ok(())
    }

    fn send_report<T: Report>(&mut self, report: T) -> Result<(), SirError> {
        self.send_reports(std::iter::once(report))
    }

    fn send_reports<T: Report>(
        &mut self,
        reports: impl IntoIterator<Item = T>,
    ) -> Result<(), SirError> {
        let writer = self
            .get_data_mut(ReportPlugin)
            .file_writers
            .get_mut(&TypeId::of::<T>())
            .ok_or_else(missing_report::<T>)?;
        write_rows(writer, reports)
    }

    fn replace_reports<T: Report>(
        &mut self,
        reports: impl IntoIterator<Item = T>,
    ) -> Result<(), SirError> {
        let data = self.get_data_mut(ReportPlugin);
        let path = data
            .file_paths
            .get(&TypeId::of::<T>())
            .ok_or_else(missing_report::<T>)?;
        let mut writer = Writer::from_writer(File::create(path)?);
        let written = write_rows(&mut writer, reports);
        data.file_writers.insert(TypeId::of::<T>(), writer);
        written
    }

    fn report_failures(&self) -> usize {
        self.get_data(ReportPlugin).map_or(0, |data| data.failures)
    }

    fn add_trajectory_report(&mut self, short_name: &str) -> Result<(), SirError> {
        self.add_report::<TrajectoryRow>(short_name)?;
        self.add_view(|context, update| {
            let Ok(output) = &update.outcome else {
                return;
            };
            let result = &output.result;
            let rows = result
                .time()
                .iter()
                .zip(result.states())
                .map(|(t, state)| TrajectoryRow {
                    recompute: update.sequence,
                    t,
                    susceptible: state.susceptible,
                    infected: state.infected,
                    recovered: state.recovered,
                });
            let written = context.replace_reports(rows);
            record_view_write(context, "trajectory", update.sequence, written);
        });
        Ok(())
    }

    fn add_summary_report(&mut self, short_name: &str) -> Result<(), SirError> {
        self.add_report::<SummaryRow>(short_name)?;
        self.add_view(|context, update| {
            let written = context.send_report(SummaryRow::from_update(update));
            record_view_write(context, "summary", update.sequence, written);
        });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::integrator::IntegratorOptions;
    use crate::parameters::{ContextParametersExt, ParameterField};
    use tempfile::tempdir;

    #[derive(Serialize, Deserialize)]
    struct SampleReport {
        id: u32,
        value: String,
    }
    define_report!(SampleReport);

    fn read_rows<T: for<'de> Deserialize<'de>>(path: &std::path::Path) -> Vec<T> {
        csv::Reader::from_path(path)
            .unwrap()
            .deserialize()
            .map(Result::unwrap)
            .collect()
    }

    #[test]
    fn add_and_send_report() {
        let temp_dir = tempdir().unwrap();
        let mut context = Context::new();
        context
            .report_options()
            .directory(temp_dir.path())
            .file_prefix("run1_");
        context.add_report::<SampleReport>("sample").unwrap();
        context
            .send_report(SampleReport {
                id: 1,
                value: "Value,1".to_string(),
            })
            .unwrap();
        context
            .send_report(SampleReport {
                id: 2,
                value: "Value\n2".to_string(),
            })
            .unwrap();

        let rows: Vec<SampleReport> = read_rows(&temp_dir.path().join("run1_sample.csv"));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].value, "Value,1");
        assert_eq!(rows[1].value, "Value\n2");
    }

    #[test]
    fn missing_directories_are_created() {
        let temp_dir = tempdir().unwrap();
        let mut context = Context::new();
        context
            .report_options()
            .directory(temp_dir.path().join("nested").join("out"));
        context.add_report::<SampleReport>("sample").unwrap();
        assert!(temp_dir
            .path()
            .join("nested")
            .join("out")
            .join("sample.csv")
            .exists());
    }

    #[test]
    fn existing_file_needs_overwrite() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join("sample.csv"), "old").unwrap();

        let mut context = Context::new();
        context.report_options().directory(temp_dir.path());
        let err = context.add_report::<SampleReport>("sample").unwrap_err();
        assert!(matches!(err, SirError::ReportError(_)));

        context.report_options().overwrite(true);
        context.add_report::<SampleReport>("sample").unwrap();
    }

    #[test]
    fn send_report_without_adding_report() {
        let mut context = Context::new();
        let err = context
            .send_report(SampleReport {
                id: 1,
                value: String::new(),
            })
            .unwrap_err();
        assert!(matches!(err, SirError::ReportError(message) if message.contains("SampleReport")));
    }

    #[test]
    fn replace_reports_truncates_the_file() {
        let temp_dir = tempdir().unwrap();
        let mut context = Context::new();
        context.report_options().directory(temp_dir.path());
        context.add_report::<SampleReport>("sample").unwrap();
        context
            .send_reports((0..3).map(|id| SampleReport {
                id,
                value: "old".to_string(),
            }))
            .unwrap();
        context
            .replace_reports(std::iter::once(SampleReport {
                id: 9,
                value: "new".to_string(),
            }))
            .unwrap();
        context
            .send_report(SampleReport {
                id: 10,
                value: "appended".to_string(),
            })
            .unwrap();

        let rows: Vec<SampleReport> = read_rows(&temp_dir.path().join("sample.csv"));
        let ids: Vec<u32> = rows.iter().map(|row| row.id).collect();
        assert_eq!(ids, vec![9, 10]);
        assert_eq!(rows[0].value, "new");
    }

    #[test]
    fn replace_reports_without_adding_report() {
        let mut context = Context::new();
        let err = context
            .replace_reports(std::iter::empty::<SampleReport>())
            .unwrap_err();
        assert!(matches!(err, SirError::ReportError(_)));
    }

    #[test]
    fn trajectory_report_holds_the_latest_recompute() {
        let temp_dir = tempdir().unwrap();
        let mut context = Context::new();
        context.report_options().directory(temp_dir.path());
        context.add_trajectory_report("trajectory").unwrap();
        context.init_recompute_controller();
        context.schedule_parameter_change(1.0, ParameterField::InfectionRate, 0.3);
        context.execute();

        let rows: Vec<TrajectoryRow> = read_rows(&temp_dir.path().join("trajectory.csv"));
        assert_eq!(rows.len(), 160);
        assert!(rows.iter().all(|row| row.recompute == 2));
        assert_eq!(rows[0].t, 0.0);
        assert_eq!(rows[0].susceptible, 999.0);
        assert_eq!(rows[0].infected, 1.0);
        assert_eq!(rows[159].t, 160.0);
        assert_eq!(context.report_failures(), 0);
        for row in &rows {
            let total = row.susceptible + row.infected + row.recovered;
            assert!((total - 1000.0).abs() <= 1e-3);
        }
    }

    #[test]
    fn summary_report_records_failures() {
        let temp_dir = tempdir().unwrap();
        let mut context = Context::new();
        context.report_options().directory(temp_dir.path());
        context.add_summary_report("summary").unwrap();
        context.set_parameter(ParameterField::InfectionRate, 0.5);
        context.init_recompute_controller();
        context.execute();

        context.set_integrator_options(IntegratorOptions {
            max_steps: 1,
            initial_step: 1e-6,
            ..IntegratorOptions::default()
        });
        context.request_recompute();

        let rows: Vec<SummaryRow> = read_rows(&temp_dir.path().join("summary.csv"));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, RecomputeStatus::Ok);
        assert_eq!(rows[0].infection_rate, 0.5);
        assert_eq!(rows[0].basic_reproduction_number, 5.0);
        assert!((rows[0].herd_immunity_threshold - 0.8).abs() < 1e-12);
        let attack_rate = rows[0].attack_rate.unwrap();
        assert!(attack_rate > 0.9 && attack_rate < 1.0);
        assert!(rows[0].peak_infected.unwrap() > 1.0);
        assert_eq!(rows[1].status, RecomputeStatus::Failed);
        assert_eq!(rows[1].recompute, 2);
        assert_eq!(rows[1].peak_infected, None);
        assert_eq!(rows[1].attack_rate, None);
        assert_eq!(rows[1].y_upper_bound, None);
    }

    #[test]
    fn trajectory_write_failures_are_counted() {
        let temp_dir = tempdir().unwrap();
        let mut context = Context::new();
        context.report_options().directory(temp_dir.path());
        context.add_trajectory_report("trajectory").unwrap();
        // A directory where the file used to be makes the rewrite fail.
        let path = temp_dir.path().join("trajectory.csv");
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        context.init_recompute_controller();
        context.schedule_parameter_change(1.0, ParameterField::InfectionRate, 0.3);
        context.execute();
        assert_eq!(context.report_failures(), 2);
    }
}
