//! CLI commands and argument parsing.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use crate::error::{EXIT_CANCELLED, EXIT_OK, Error};
use crate::progress::CancelToken;
use crate::types::{Job, Mode, SplitSpec, SplitUnit};
use crate::{file, pipeline, ui};

/// Picocrypt - a very small, very simple, yet very secure encryption tool.
#[derive(Parser)]
#[command(name = "picocrypt", version = crate::config::VERSION)]
#[command(about = "Encrypt files with XChaCha20 and Argon2id, with optional Reed-Solomon error correction, keyfiles, and paranoid-mode Serpent cascading.")]
pub struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt files or folders into a .pcv volume.
    Encrypt {
        /// Files and folders to encrypt. More than one item (or any
        /// folder) is bundled into an intermediate zip first.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output path (defaults to the input name plus .pcv).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Password (prompted when not given).
        #[arg(short, long)]
        password: Option<String>,

        /// Keyfile to mix into the cipher key; repeatable.
        #[arg(short, long)]
        keyfile: Vec<PathBuf>,

        /// Require the correct keyfile order on decryption.
        #[arg(long, requires = "keyfile")]
        ordered: bool,

        /// Paranoid mode: Serpent cascade, HMAC-SHA3, stronger Argon2.
        #[arg(long)]
        paranoid: bool,

        /// Encode the volume with Reed-Solomon error correction.
        #[arg(long)]
        reed_solomon: bool,

        /// Compress the intermediate zip instead of storing it.
        #[arg(long)]
        compress: bool,

        /// Free-text metadata stored unencrypted in the header.
        #[arg(short, long)]
        metadata: Option<String>,

        /// Split the output into parts of this many units.
        #[arg(long, value_name = "SIZE")]
        split: Option<u64>,

        /// Unit for --split.
        #[arg(long, value_enum, default_value_t = SplitUnitArg::MiB)]
        split_unit: SplitUnitArg,

        /// Delete the originals after a successful encryption.
        #[arg(long)]
        delete: bool,

        /// Overwrite an existing output without asking.
        #[arg(short, long)]
        force: bool,
    },

    /// Decrypt a .pcv volume or one part of a split set.
    Decrypt {
        /// The volume (or any part of a split set).
        input: PathBuf,

        /// Output path (defaults to the volume name without .pcv).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Password (prompted when not given).
        #[arg(short, long)]
        password: Option<String>,

        /// Keyfile the volume was encrypted with; repeatable.
        #[arg(short, long)]
        keyfile: Vec<PathBuf>,

        /// Keep the decrypted output even if it is corrupted or modified.
        #[arg(long)]
        keep: bool,

        /// Delete the volume (or all its parts) after a successful
        /// decryption.
        #[arg(long)]
        delete: bool,

        /// Overwrite an existing output without asking.
        #[arg(short, long)]
        force: bool,
    },

    /// Show a volume's version, metadata, and options.
    Info {
        /// The volume (or any part of a split set).
        input: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SplitUnitArg {
    #[value(name = "KiB")]
    KiB,
    #[value(name = "MiB")]
    MiB,
    #[value(name = "GiB")]
    GiB,
}

impl From<SplitUnitArg> for SplitUnit {
    fn from(unit: SplitUnitArg) -> Self {
        match unit {
            SplitUnitArg::KiB => Self::KiB,
            SplitUnitArg::MiB => Self::MiB,
            SplitUnitArg::GiB => Self::GiB,
        }
    }
}

impl App {
    /// Initializes logging and parses the command line.
    ///
    /// # Errors
    /// Fails when the tracing subscriber cannot be installed.
    pub fn init() -> Result<Self> {
        let subscriber = tracing_subscriber::fmt().with_file(true).with_line_number(true).finish();
        tracing::subscriber::set_global_default(subscriber)?;
        Ok(Self::parse())
    }

    /// Runs the selected command and maps the outcome to an exit code.
    #[must_use]
    pub fn execute(self) -> ExitCode {
        match self.command {
            Commands::Encrypt {
                inputs,
                output,
                password,
                keyfile,
                ordered,
                paranoid,
                reed_solomon,
                compress,
                metadata,
                split,
                split_unit,
                delete,
                force,
            } => {
                if split == Some(0) {
                    ui::show_error("split size must be non-zero");
                    return ExitCode::FAILURE;
                }

                let mut job = Job::new(Mode::Encrypt, inputs);
                job.output = output;
                job.keyfiles = keyfile;
                job.keyfile_order_matters = ordered;
                job.paranoid = paranoid;
                job.reed_solomon = reed_solomon;
                job.compress = compress;
                job.metadata = metadata.unwrap_or_default();
                job.split = split.map(|size| SplitSpec { size, unit: split_unit.into() });
                job.delete_when_done = delete;

                Self::run_job(job, password, force)
            }

            Commands::Decrypt { input, output, password, keyfile, keep, delete, force } => {
                // Surface what the volume expects before asking for
                // credentials; hard refusals exit here.
                match file::inspect_volume(&input) {
                    Ok(info) => ui::show_keyfile_hint(&info),
                    Err(e @ (Error::UnsupportedVersion(_) | Error::NotAVolume)) => {
                        ui::show_error(&e.to_string());
                        return ExitCode::from(e.exit_code());
                    }
                    // Anything else is the pipeline's to report.
                    Err(_) => {}
                }

                let mut job = Job::new(Mode::Decrypt, vec![input]);
                job.output = output;
                job.keyfiles = keyfile;
                job.keep = keep;
                job.delete_when_done = delete;

                Self::run_job(job, password, force)
            }

            Commands::Info { input } => match file::inspect_volume(&input) {
                Ok(info) => {
                    ui::show_volume_info(&info);
                    ExitCode::from(EXIT_OK)
                }
                Err(e) => {
                    ui::show_error(&e.to_string());
                    ExitCode::from(e.exit_code())
                }
            },
        }
    }

    fn run_job(mut job: Job, password: Option<String>, force: bool) -> ExitCode {
        match Self::planned_output(&job) {
            Ok(output) if output.exists() && !force => match ui::confirm_overwrite(&output) {
                Ok(true) => {}
                Ok(false) => {
                    ui::show_warning("Operation cancelled by user.");
                    return ExitCode::from(EXIT_CANCELLED);
                }
                Err(e) => {
                    ui::show_error(&format!("{e:#}"));
                    return ExitCode::FAILURE;
                }
            },
            // Staging errors resurface from the pipeline with their exit
            // code; don't fail the confirmation step on them.
            _ => {}
        }

        job.password = match password.map_or_else(|| ui::prompt_password(job.mode), Ok) {
            Ok(password) => password,
            Err(e) => {
                ui::show_error(&format!("{e:#}"));
                return ExitCode::FAILURE;
            }
        };

        let progress = ui::TermProgress::new();
        let result = pipeline::run(&job, &progress, &CancelToken::new());
        progress.finish();

        match result {
            Ok(report) => {
                if report.kept {
                    ui::show_warning("The input file is corrupted and/or modified. Please be careful.");
                } else {
                    ui::show_success("Completed.");
                }
                println!("  {}", report.output.display());
                ExitCode::from(EXIT_OK)
            }
            Err(e) => {
                ui::show_error(&e.to_string());
                ExitCode::from(e.exit_code())
            }
        }
    }

    /// The output path the job would produce, for the overwrite check.
    fn planned_output(job: &Job) -> Result<PathBuf, Error> {
        match job.mode {
            Mode::Encrypt => {
                let staged = file::stage_encrypt(&job.sources)?;
                Ok(job.output.as_ref().map_or_else(|| file::default_encrypt_output(&staged), |requested| file::normalize_encrypt_output(requested, &staged)))
            }
            Mode::Decrypt => {
                let source: &Path = &job.sources[0];
                let staged = file::stage_decrypt(source)?;
                let volume = match &staged {
                    file::DecryptInput::Volume(path) => path.clone(),
                    file::DecryptInput::Split { base } => base.clone(),
                };
                Ok(job.output.as_ref().map_or_else(|| file::default_decrypt_output(&staged), |requested| file::normalize_decrypt_output(requested, &volume)))
            }
        }
    }
}
