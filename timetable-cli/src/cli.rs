//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "timetable")]
#[command(version, about = "Timetable admin command-line client")]
pub struct Cli {
    /// Backend base URL for this run (overrides stored settings)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Database file [default: platform data directory]
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session
    Login {
        /// Username or email
        #[arg(short, long)]
        user: String,
        #[arg(short, long, env = "TIMETABLE_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and store the session
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TIMETABLE_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        registration_number: String,
        #[arg(long, value_enum, default_value_t = RoleArg::Student)]
        role: RoleArg,
    },
    /// Forget the stored session
    Logout,
    /// Show the locally stored user
    Whoami,
    /// Fetch the profile from the backend
    Profile,
    Courses {
        #[command(subcommand)]
        action: ResourceAction,
    },
    Instructors {
        #[command(subcommand)]
        action: ResourceAction,
    },
    Rooms {
        #[command(subcommand)]
        action: ResourceAction,
    },
    Timetable {
        #[command(subcommand)]
        action: TimetableAction,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleArg {
    Admin,
    Student,
}

#[derive(Subcommand, Debug)]
pub enum ResourceAction {
    List,
    Get { id: String },
    /// Create from a JSON object
    Add { data: String },
    /// Update fields from a JSON object
    Update { id: String, data: String },
    Delete { id: String },
}

#[derive(Args, Debug, Clone, Default)]
pub struct Filters {
    #[arg(long)]
    pub department: Option<String>,
    #[arg(long)]
    pub semester: Option<String>,
    #[arg(long)]
    pub shift: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum TimetableAction {
    /// Generate a timetable from a JSON request
    Generate { data: String },
    Show {
        #[command(flatten)]
        filters: Filters,
    },
    /// Edit one timetable entry
    Edit { id: String, data: String },
    /// Download the PDF
    Download {
        #[command(flatten)]
        filters: Filters,
        /// Directory to save into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Email the timetable to one student (JSON payload)
    Send { data: String },
    /// Email the timetable to every student
    SendAll,
    /// The logged-in student's timetable
    StudentShow {
        #[command(flatten)]
        filters: Filters,
    },
    StudentDownload {
        #[command(flatten)]
        filters: Filters,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    Show,
    Set { key: ConfigKey, value: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    BaseUrl,
    RefreshPath,
    /// Seconds, 0 to disable
    RequestTimeout,
    /// Seconds, 0 to disable
    RefreshTimeout,
}
