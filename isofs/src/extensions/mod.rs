//! ISO 9660 extensions carried in the System Use area of directory records

pub mod rock_ridge;
