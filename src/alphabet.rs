use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("base `{0}` unknown, no complement found")]
pub struct UnknownBase(pub char);

/// Nucleotide alphabet for complement tables and base counting.
///
/// The alphabet is passed explicitly to every operation that needs it; there
/// is no process-wide DNA/RNA switch.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Alphabet {
    Dna,
    Rna,
}

impl Alphabet {
    pub fn from_rna_flag(rna: bool) -> Self {
        if rna {
            Alphabet::Rna
        } else {
            Alphabet::Dna
        }
    }

    /// The IUPAC symbols recognised by this alphabet, accurate bases first.
    pub fn symbols(&self) -> &'static [u8] {
        match self {
            Alphabet::Dna => b"ACGTNYRSWMK",
            Alphabet::Rna => b"ACGUNYRSWMK",
        }
    }

    /// IUPAC complement of a single base. A pairs with T (U for RNA),
    /// C with G; ambiguity codes map onto their own complements (N stays N,
    /// Y and R swap, S and W are self-complementary, M and K swap).
    pub fn complement(&self, base: u8) -> Result<u8, UnknownBase> {
        let paired = match (self, base) {
            (Alphabet::Dna, b'A') => b'T',
            (Alphabet::Dna, b'T') => b'A',
            (Alphabet::Rna, b'A') => b'U',
            (Alphabet::Rna, b'U') => b'A',
            (_, b'C') => b'G',
            (_, b'G') => b'C',
            (_, b'N') => b'N',
            (_, b'Y') => b'R',
            (_, b'R') => b'Y',
            (_, b'S') => b'S',
            (_, b'W') => b'W',
            (_, b'M') => b'K',
            (_, b'K') => b'M',
            (_, other) => return Err(UnknownBase(other as char)),
        };
        Ok(paired)
    }

    pub fn complement_seq(&self, seq: &[u8]) -> Result<Vec<u8>, UnknownBase> {
        seq.iter().map(|&b| self.complement(b)).collect()
    }

    /// Complement, then reverse.
    pub fn reverse_complement(&self, seq: &[u8]) -> Result<Vec<u8>, UnknownBase> {
        let mut comp = self.complement_seq(seq)?;
        comp.reverse();
        Ok(comp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complement_is_an_involution_on_accurate_dna() {
        let seq = b"ACGTACGT";
        let once = Alphabet::Dna.complement_seq(seq).unwrap();
        let twice = Alphabet::Dna.complement_seq(&once).unwrap();
        assert_eq!(twice, seq);
    }

    #[test]
    fn n_is_self_complementary() {
        assert_eq!(Alphabet::Dna.complement(b'N').unwrap(), b'N');
        assert_eq!(Alphabet::Rna.complement(b'N').unwrap(), b'N');
    }

    #[test]
    fn rna_pairs_a_with_u() {
        assert_eq!(Alphabet::Rna.complement(b'A').unwrap(), b'U');
        assert_eq!(Alphabet::Rna.complement(b'U').unwrap(), b'A');
        // T is not part of the RNA alphabet
        assert!(Alphabet::Rna.complement(b'T').is_err());
    }

    #[test]
    fn unknown_base_is_reported() {
        assert_eq!(Alphabet::Dna.complement(b'X'), Err(UnknownBase('X')));
    }

    #[test]
    fn reverse_complement_reverses_after_pairing() {
        assert_eq!(
            Alphabet::Dna.reverse_complement(b"AAGT").unwrap(),
            b"ACTT".to_vec()
        );
    }
}
