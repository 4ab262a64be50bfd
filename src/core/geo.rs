//! Geografische Grundtypen: Koordinate (lon/lat) und Bounding-Box.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// Koordinate eines Points: `x` = Längengrad, `y` = Breitengrad.
pub type Loc = DVec2;

/// Achsenparallele Bounding-Box in lon/lat.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    /// Südwest-Ecke
    pub min: Loc,
    /// Nordost-Ecke
    pub max: Loc,
}

impl BBox {
    /// Erstellt eine Box aus zwei beliebigen Ecken (normalisiert min/max).
    pub fn new(a: Loc, b: Loc) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Degenerierte Box um einen einzelnen Punkt.
    pub fn from_point(loc: Loc) -> Self {
        Self { min: loc, max: loc }
    }

    /// Kleinste Box um alle Punkte, `None` bei leerer Eingabe.
    pub fn from_points(points: impl IntoIterator<Item = Loc>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Self::from_point(first), |bbox, p| bbox.extend_point(p)))
    }

    /// Vergrößert die Box so, dass `loc` enthalten ist.
    pub fn extend_point(self, loc: Loc) -> Self {
        Self {
            min: self.min.min(loc),
            max: self.max.max(loc),
        }
    }

    /// Vereinigung zweier Boxen.
    pub fn union(self, other: BBox) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Box um `pad` in alle Richtungen erweitert.
    pub fn padded(self, pad: f64) -> Self {
        Self {
            min: self.min - DVec2::splat(pad),
            max: self.max + DVec2::splat(pad),
        }
    }

    /// Prüft, ob sich zwei Boxen schneiden (Ränder zählen als Schnitt).
    pub fn intersects(&self, other: &BBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    /// Prüft, ob `loc` innerhalb der Box liegt.
    pub fn contains(&self, loc: Loc) -> bool {
        loc.x >= self.min.x && loc.x <= self.max.x && loc.y >= self.min.y && loc.y <= self.max.y
    }

    /// Mittelpunkt der Box.
    pub fn center(&self) -> Loc {
        (self.min + self.max) * 0.5
    }

    /// Halbe Ausdehnung pro Achse.
    pub fn half_size(&self) -> DVec2 {
        (self.max - self.min) * 0.5
    }
}
