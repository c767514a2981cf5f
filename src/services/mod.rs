pub mod assembly_service;
pub mod categories;
pub mod csv_service;
pub mod material_service;
pub mod ordering;
pub mod pagination;
pub mod project_service;
pub mod team_service;

pub use assembly_service::AssemblyService;
pub use csv_service::CsvService;
pub use material_service::MaterialService;
pub use project_service::ProjectService;
pub use team_service::TeamService;
