//! Mapa wykonanych prac: megye -> miasta.
//!
//! Biblioteka ładuje wielokąty megye i listę miejscowości, zamienia nazwy miast
//! na współrzędne wewnątrz ich megye i prowadzi widok (ogólny / wybrany megye)
//! z kamerą blokowaną po każdym przejściu.

pub mod bounds;
pub mod camera;
pub mod config;
pub mod data;
pub mod gazetteer;
pub mod geocode;
pub mod normalize;
pub mod projection;
pub mod region;
pub mod view;
pub mod workmap;

pub use workmap::{RegionReport, RegionSummary, WorkMap};
