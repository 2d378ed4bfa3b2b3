//! Four-vector kinematics for the di-photon system.

use crate::event::Event;

/// A four-momentum in Cartesian components (detector convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FourMomentum {
    /// x-component of momentum (GeV).
    pub px: f64,
    /// y-component of momentum (GeV).
    pub py: f64,
    /// z-component of momentum (GeV).
    pub pz: f64,
    /// Energy (GeV).
    pub e: f64,
}

impl FourMomentum {
    /// Build a four-momentum from collider coordinates:
    /// `px = pt·cos(phi)`, `py = pt·sin(phi)`, `pz = pt·sinh(eta)`, `E = e`.
    pub fn from_pt_eta_phi_e(pt: f64, eta: f64, phi: f64, e: f64) -> Self {
        Self { px: pt * phi.cos(), py: pt * phi.sin(), pz: pt * eta.sinh(), e }
    }

    /// Invariant mass `sqrt(E² − |p|²)`.
    ///
    /// A space-like four-vector (negative radicand) yields NaN rather than
    /// an error; the zero-mass selection cut removes such events.
    pub fn invariant_mass(&self) -> f64 {
        let p2 = self.px * self.px + self.py * self.py + self.pz * self.pz;
        (self.e * self.e - p2).sqrt()
    }
}

impl std::ops::Add for FourMomentum {
    type Output = FourMomentum;

    fn add(self, rhs: FourMomentum) -> FourMomentum {
        FourMomentum {
            px: self.px + rhs.px,
            py: self.py + rhs.py,
            pz: self.pz + rhs.pz,
            e: self.e + rhs.e,
        }
    }
}

/// Invariant mass of the two leading photons of a well-formed event (GeV).
pub fn diphoton_mass(event: &Event) -> f64 {
    let p0 = FourMomentum::from_pt_eta_phi_e(
        event.photon_pt[0],
        event.photon_eta[0],
        event.photon_phi[0],
        event.photon_e[0],
    );
    let p1 = FourMomentum::from_pt_eta_phi_e(
        event.photon_pt[1],
        event.photon_eta[1],
        event.photon_phi[1],
        event.photon_e[1],
    );
    (p0 + p1).invariant_mass()
}
