use crate::{Error, SignatureAggregator};
use smallvec::SmallVec;
use types::{Attestation, BitList, EthSpec, SignatureBytes};

/// Greedily accumulates bit-disjoint attestations sharing the same data into one aggregate.
///
/// The builder holds references to the source attestations and only materializes a new
/// `Attestation` in [`AggregateBuilder::build`], so an unproductive walk allocates nothing.
pub struct AggregateBuilder<'a, E: EthSpec> {
    parts: SmallVec<[&'a Attestation<E>; 4]>,
    participants: Option<BitList<E::MaxValidatorsPerSlot>>,
}

impl<'a, E: EthSpec> AggregateBuilder<'a, E> {
    pub fn new() -> Self {
        Self {
            parts: SmallVec::new(),
            participants: None,
        }
    }

    /// The union of aggregation bits absorbed so far.
    pub fn participants(&self) -> Option<&BitList<E::MaxValidatorsPerSlot>> {
        self.participants.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Whether `candidate` can be absorbed: its signers must be disjoint from everything
    /// absorbed so far and, for committee-bits attestations, it must cover the same
    /// committees.
    pub fn can_aggregate(&self, candidate: &Attestation<E>) -> bool {
        let first = match self.parts.first() {
            Some(first) => first,
            None => return true,
        };

        match (first, candidate) {
            (Attestation::Base(_), Attestation::Base(_)) => {}
            (Attestation::Electra(existing), Attestation::Electra(candidate)) => {
                if existing.committee_bits != candidate.committee_bits {
                    return false;
                }
            }
            _ => return false,
        }

        match &self.participants {
            Some(bits) => {
                candidate.aggregation_bits().len() == bits.len()
                    && bits.intersection(candidate.aggregation_bits()).is_zero()
            }
            None => true,
        }
    }

    /// Absorb `candidate` into the accumulator. Callers must check [`Self::can_aggregate`]
    /// first.
    pub fn aggregate(&mut self, candidate: &'a Attestation<E>) {
        self.participants = Some(match self.participants.take() {
            Some(bits) => bits.union(candidate.aggregation_bits()),
            None => candidate.aggregation_bits().clone(),
        });
        self.parts.push(candidate);
    }

    /// Produce the aggregate attestation.
    ///
    /// A single-part aggregate is returned unchanged, original signature included;
    /// multi-part aggregates get the union bits and an `aggregator`-combined signature.
    /// Building from zero parts is an internal invariant violation.
    pub fn build<A: SignatureAggregator>(self, aggregator: &A) -> Result<Attestation<E>, Error> {
        let (first, rest) = self.parts.split_first().ok_or(Error::EmptyAggregate)?;
        let mut aggregate = (*first).clone();

        if rest.is_empty() {
            return Ok(aggregate);
        }

        let signatures: SmallVec<[&SignatureBytes; 4]> =
            self.parts.iter().map(|part| part.signature()).collect();

        *aggregate.aggregation_bits_mut() = self.participants.ok_or(Error::EmptyAggregate)?;
        *aggregate.signature_mut() = aggregator.combine(&signatures);
        Ok(aggregate)
    }
}

impl<'a, E: EthSpec> Default for AggregateBuilder<'a, E> {
    fn default() -> Self {
        Self::new()
    }
}
