pub mod assemblies;
pub mod health;
pub mod index;
pub mod materials;
pub mod settings;
