//! CSV event logs written under the run's output location.
//!
//! A report is a `Serialize` row type declared with [`define_report!`]. Each report type is bound
//! to one file with [`ContextReportExt::add_report`], after which [`ContextReportExt::send_report`]
//! appends a row. Sending a report that was never added is a no-op, which is how the event log
//! level switches individual logs off.
use std::any::TypeId;
use std::cell::RefCell;
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use csv::Writer;
use log::{trace, warn};

use crate::context::Context;
use crate::error::StrideError;
use crate::{define_data_plugin, HashMap};

pub trait Report: 'static {
    // Returns report type
    fn type_id(&self) -> TypeId;
    // Serializes the data with the correct writer
    fn serialize(&self, writer: &mut Writer<File>) -> Result<(), csv::Error>;
}

/// Use this macro to define a unique report type
#[macro_export]
macro_rules! define_report {
    ($name:ident) => {
        impl $crate::report::Report for $name {
            fn type_id(&self) -> std::any::TypeId {
                std::any::TypeId::of::<$name>()
            }

            fn serialize(
                &self,
                writer: &mut $crate::csv::Writer<std::fs::File>,
            ) -> Result<(), $crate::csv::Error> {
                writer.serialize(self)
            }
        }
    };
}
pub use define_report;

/// Where report files go: `<output_dir>/<file_prefix><short name>.csv`.
#[derive(Clone, Debug)]
pub struct ReportOptions {
    pub file_prefix: String,
    pub output_dir: PathBuf,
    pub overwrite: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            file_prefix: String::new(),
            output_dir: PathBuf::from("."),
            overwrite: true,
        }
    }
}

impl ReportOptions {
    #[must_use]
    pub fn new() -> ReportOptions {
        ReportOptions::default()
    }

    pub fn file_prefix(&mut self, file_prefix: &str) -> &mut ReportOptions {
        self.file_prefix = file_prefix.to_string();
        self
    }

    pub fn directory(&mut self, directory: impl Into<PathBuf>) -> &mut ReportOptions {
        self.output_dir = directory.into();
        self
    }

    pub fn overwrite(&mut self, overwrite: bool) -> &mut ReportOptions {
        self.overwrite = overwrite;
        self
    }

    /// The full path of the report file with the given short name.
    #[must_use]
    pub fn path_for(&self, short_name: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}{short_name}.csv", self.file_prefix))
    }
}

struct ReportData {
    options: ReportOptions,
    file_writers: RefCell<HashMap<TypeId, Writer<File>>>,
}

// Registers a data container that stores
// * options: the output directory, prefix and overwrite policy
// * file_writers: Maps report type to file writer
define_data_plugin!(
    ReportPlugin,
    ReportData,
    ReportData {
        options: ReportOptions::default(),
        file_writers: RefCell::new(HashMap::default()),
    }
);

// Checks that the path is valid. Creates the file and all parent directories if
// they do not exist. Returns the file if successful. Called by `add_report`
fn generate_validate_filepath(path: &Path, overwrite: bool) -> Result<File, StrideError> {
    if path.extension().and_then(|ext| ext.to_str()) != Some("csv") {
        return Err(StrideError::ReportError(
            "Report output files must be CSVs".to_string(),
        ));
    }
    if !overwrite && path.exists() {
        return Err(StrideError::ReportError(format!(
            "report file {} already exists",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    Ok(File::create(path)?)
}

pub trait ContextReportExt {
    /// Returns the options that `add_report` uses to place files. Mutate them before adding
    /// reports.
    fn report_options(&mut self) -> &mut ReportOptions;

    /// Call `add_report` with each report type, passing the short name of the report, e.g.
    /// `"incidence"` for `<output_dir>/<file_prefix>incidence.csv`.
    ///
    /// # Errors
    ///
    /// Returns a `StrideError` if the file cannot be created or already exists while
    /// `overwrite` is off.
    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<PathBuf, StrideError>;

    /// Write a new row with columns following items in the report struct to the report file
    /// associated with the report type struct. Does nothing if the report was not added.
    fn send_report<T: Report>(&self, report: T);

    /// Flushes and closes every report file.
    fn close_reports(&mut self);
}

impl ContextReportExt for Context {
    fn report_options(&mut self) -> &mut ReportOptions {
        &mut self.get_data_container_mut(ReportPlugin).options
    }

    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<PathBuf, StrideError> {
        let data_container = self.get_data_container_mut(ReportPlugin);
        let path = data_container.options.path_for(short_name);
        let file = generate_validate_filepath(&path, data_container.options.overwrite)?;
        trace!("writing report {} to {}", short_name, path.display());
        data_container
            .file_writers
            .borrow_mut()
            .insert(TypeId::of::<T>(), Writer::from_writer(file));
        Ok(path)
    }

    fn send_report<T: Report>(&self, report: T) {
        // No data container will exist if no reports have been added
        let Some(data_container) = self.get_data_container(ReportPlugin) else {
            return;
        };
        let mut writer_cell = data_container.file_writers.borrow_mut();
        let Some(writer) = writer_cell.get_mut(&report.type_id()) else {
            return;
        };
        if let Err(e) = report.serialize(writer).and_then(|()| Ok(writer.flush()?)) {
            warn!("failed to write report row: {e}");
        }
    }

    fn close_reports(&mut self) {
        let data_container = self.get_data_container_mut(ReportPlugin);
        for (_, mut writer) in data_container.file_writers.borrow_mut().drain() {
            if let Err(e) = writer.flush() {
                warn!("failed to flush report: {e}");
            }
        }
    }
}
