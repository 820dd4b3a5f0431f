//! Tallying of encrypted votes.
//!
//! Each vote is an encryption of `1` filed under a candidate, so a candidate's
//! total is the decryption of the homomorphic sum of their votes. Individual
//! votes are never decrypted.

use std::collections::{btree_map::Entry, BTreeMap};

use num_traits::ToPrimitive;

use crate::crypto::{Ciphertext, CryptoError, PaillierPrivateKey};
use crate::model::api::vote::EncryptedVote;

/// Sum up the votes for each candidate and decrypt only the totals.
pub fn tally_votes<'a, I>(
    private_key: &PaillierPrivateKey,
    votes: I,
) -> Result<BTreeMap<String, u64>, CryptoError>
where
    I: IntoIterator<Item = &'a EncryptedVote>,
{
    let public_key = private_key.public_key();
    let mut sums: BTreeMap<String, Ciphertext> = BTreeMap::new();
    for vote in votes {
        let cipher: Ciphertext = vote.vote_cipher.parse()?;
        match sums.entry(vote.candidate.clone()) {
            Entry::Occupied(mut sum) => {
                let new_sum = public_key.add(sum.get(), &cipher);
                sum.insert(new_sum);
            }
            Entry::Vacant(slot) => {
                slot.insert(cipher);
            }
        }
    }

    sums.into_iter()
        .map(|(candidate, sum)| {
            let total = private_key.decrypt(&sum)?.to_u64().ok_or_else(|| {
                CryptoError::MalformedCiphertext(format!("total for {candidate} out of range"))
            })?;
            Ok((candidate, total))
        })
        .collect()
}
