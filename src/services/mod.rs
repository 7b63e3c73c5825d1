// Catalog reads and admin writes
pub mod catalog;

// Collaborators consumed by the catalog services
pub mod i18n;
pub mod media;
