pub mod generic_msa;
pub mod mhc_chain_msa;
pub mod peptide_msa;
pub mod tcr_chain_msa;
