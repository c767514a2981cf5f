pub mod assemblies;
pub mod layer_segments;
pub mod layers;
pub mod material_categories;
pub mod materials;
pub mod projects;
pub mod teams;
pub mod users;
