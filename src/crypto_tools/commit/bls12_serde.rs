//! serde support for bls12_381, following the k256_serde pattern:
//! group elements travel as compressed encodings and deserialization
//! rejects anything that is not a valid point.
use bls12_381::{G1Affine, G1Projective, G2Affine, G2Projective};
use serde::{de, de::Error, de::Visitor, Deserialize, Deserializer, Serialize, Serializer};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct G1Point(G1Projective);

impl G1Point {
    pub fn to_bytes(&self) -> [u8; 48] {
        G1Affine::from(&self.0).to_compressed()
    }

    pub fn from_bytes(bytes: &[u8; 48]) -> Option<Self> {
        Option::<G1Affine>::from(G1Affine::from_compressed(bytes))
            .map(|affine| Self(G1Projective::from(affine)))
    }
}

impl AsRef<G1Projective> for G1Point {
    fn as_ref(&self) -> &G1Projective {
        &self.0
    }
}

impl From<G1Projective> for G1Point {
    fn from(p: G1Projective) -> Self {
        Self(p)
    }
}

impl Serialize for G1Point {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for G1Point {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_bytes(G1PointVisitor)
    }
}

struct G1PointVisitor;

impl<'de> Visitor<'de> for G1PointVisitor {
    type Value = G1Point;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("compressed BLS12-381 G1 point")
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        let bytes: &[u8; 48] = v
            .try_into()
            .map_err(|_| E::custom("invalid G1 encoding length"))?;
        G1Point::from_bytes(bytes).ok_or_else(|| E::custom("invalid G1 point"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct G2Point(G2Projective);

impl G2Point {
    pub fn to_bytes(&self) -> [u8; 96] {
        G2Affine::from(&self.0).to_compressed()
    }

    pub fn from_bytes(bytes: &[u8; 96]) -> Option<Self> {
        Option::<G2Affine>::from(G2Affine::from_compressed(bytes))
            .map(|affine| Self(G2Projective::from(affine)))
    }
}

impl AsRef<G2Projective> for G2Point {
    fn as_ref(&self) -> &G2Projective {
        &self.0
    }
}

impl From<G2Projective> for G2Point {
    fn from(p: G2Projective) -> Self {
        Self(p)
    }
}

impl Serialize for G2Point {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for G2Point {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_bytes(G2PointVisitor)
    }
}

struct G2PointVisitor;

impl<'de> Visitor<'de> for G2PointVisitor {
    type Value = G2Point;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("compressed BLS12-381 G2 point")
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        let bytes: &[u8; 96] = v
            .try_into()
            .map_err(|_| E::custom("invalid G2 encoding length"))?;
        G2Point::from_bytes(bytes).ok_or_else(|| E::custom("invalid G2 point"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Scalar(bls12_381::Scalar);

impl AsRef<bls12_381::Scalar> for Scalar {
    fn as_ref(&self) -> &bls12_381::Scalar {
        &self.0
    }
}

impl From<bls12_381::Scalar> for Scalar {
    fn from(s: bls12_381::Scalar) -> Self {
        Self(s)
    }
}

impl Serialize for Scalar {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bytes: [u8; 32] = self.0.to_bytes();
        bytes.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Scalar {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: [u8; 32] = Deserialize::deserialize(deserializer)?;
        Option::<bls12_381::Scalar>::from(bls12_381::Scalar::from_bytes(&bytes))
            .map(Self)
            .ok_or_else(|| D::Error::custom("integer exceeds the BLS12-381 group order"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdk::api::{deserialize, serialize};
    use bls12_381::Scalar as Fr;
    use ff::Field;
    use group::Group;

    #[test]
    fn basic_round_trip() {
        let mut rng = rand::thread_rng();

        let s = Scalar::from(Fr::random(&mut rng));
        let s_bytes = serialize(&s).unwrap();
        assert_eq!(deserialize::<Scalar>(&s_bytes).unwrap(), s);

        let p1 = G1Point::from(G1Projective::random(&mut rng));
        let p1_bytes = serialize(&p1).unwrap();
        assert_eq!(deserialize::<G1Point>(&p1_bytes).unwrap(), p1);

        let p2 = G2Point::from(G2Projective::random(&mut rng));
        let p2_bytes = serialize(&p2).unwrap();
        assert_eq!(deserialize::<G2Point>(&p2_bytes).unwrap(), p2);

        // garbage bytes are not a point
        assert!(deserialize::<G1Point>(&serialize(&vec![1u8; 48]).unwrap()).is_none());
    }
}
