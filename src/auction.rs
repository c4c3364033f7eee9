//! English auction escrow: single-file Solana program.
//!
//! A seller escrows one item and a currency custody account under an
//! authority derived from their own key. Bidders outbid each other through
//! that custody; the previous high bid is refunded inside the same
//! instruction. The seller closes the auction to settle both sides.

#![deny(unsafe_code)]

// 1. mod constants
pub mod constants {
    use core::mem::size_of;
    use crate::state::AuctionRecord;

    pub const MAGIC: u64 = 0x4155_4354_494f_4e00; // "AUCTION\0"
    pub const VERSION: u32 = 1;

    pub const RECORD_LEN: usize = size_of::<AuctionRecord>();
}

// 2. mod error
pub mod error {
    use num_derive::FromPrimitive;
    use num_traits::FromPrimitive;
    use solana_program::{
        decode_error::DecodeError,
        msg,
        program_error::{PrintProgramError, ProgramError},
    };
    use thiserror::Error;

    /// Codes are part of the client contract; never renumber.
    #[derive(Clone, Copy, Debug, Eq, Error, FromPrimitive, PartialEq)]
    pub enum AuctionError {
        #[error("your bid price is too low")]
        BidTooLow = 100,
        #[error("auction record is already initialized")]
        AlreadyInitialized = 101,
        #[error("auction record is not initialized")]
        NotInitialized = 102,
        #[error("auction record has the wrong size")]
        InvalidRecordLen = 103,
        #[error("item custody is not owned by the escrow authority")]
        InvalidItemOwner = 104,
        #[error("currency custody is not owned by the escrow authority")]
        InvalidCurrencyOwner = 105,
        #[error("escrow authority does not match the derived address")]
        InvalidAuthority = 106,
        #[error("custody account does not match the auction record")]
        InvalidCustodyAccount = 107,
        #[error("refund receiver does not match the current refund target")]
        RefundTargetMismatch = 108,
        #[error("auction is closed")]
        AuctionClosed = 109,
        #[error("caller is not authorized for this auction")]
        Unauthorized = 110,
        #[error("account must sign")]
        ExpectedSigner = 111,
        #[error("account must be writable")]
        ExpectedWritable = 112,
        #[error("token account mint does not match custody")]
        MintMismatch = 113,
        #[error("settlement receiver does not belong to the expected party")]
        InvalidReceiver = 114,
        #[error("bidder account balance is below the bid")]
        InsufficientFunds = 115,
    }

    impl From<AuctionError> for ProgramError {
        fn from(e: AuctionError) -> Self {
            ProgramError::Custom(e as u32)
        }
    }

    impl<T> DecodeError<T> for AuctionError {
        fn type_of() -> &'static str {
            "AuctionError"
        }
    }

    impl PrintProgramError for AuctionError {
        fn print<E>(&self)
        where
            E: 'static + std::error::Error + DecodeError<E> + PrintProgramError + FromPrimitive,
        {
            msg!("Error: {}", self);
        }
    }
}

// 3. mod ix
pub mod ix {
    use solana_program::{
        instruction::{AccountMeta, Instruction as SolInstruction},
        program_error::ProgramError,
        pubkey::Pubkey,
    };

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Instruction {
        /// Accounts: auction (w), seller (s), item_custody, currency_custody.
        CreateAuction { start_price: u64 },
        /// Accounts: auction (w), bidder (s), from (w), currency_custody (w),
        /// ori_refund_receiver (w), escrow_authority, token_program.
        Bid { amount: u64 },
        /// Accounts: auction (w), seller (s), item_custody (w), item_receiver (w),
        /// currency_custody (w), currency_receiver (w), escrow_authority, token_program.
        CloseAuction,
    }

    impl Instruction {
        pub fn decode(input: &[u8]) -> Result<Self, ProgramError> {
            let (&tag, mut rest) = input.split_first().ok_or(ProgramError::InvalidInstructionData)?;

            match tag {
                0 => {
                    let start_price = read_u64(&mut rest)?;
                    Ok(Instruction::CreateAuction { start_price })
                }
                1 => {
                    let amount = read_u64(&mut rest)?;
                    Ok(Instruction::Bid { amount })
                }
                2 => Ok(Instruction::CloseAuction),
                _ => Err(ProgramError::InvalidInstructionData),
            }
        }

        pub fn encode(&self) -> Vec<u8> {
            let mut buf = Vec::with_capacity(9);
            match self {
                Instruction::CreateAuction { start_price } => {
                    buf.push(0);
                    buf.extend_from_slice(&start_price.to_le_bytes());
                }
                Instruction::Bid { amount } => {
                    buf.push(1);
                    buf.extend_from_slice(&amount.to_le_bytes());
                }
                Instruction::CloseAuction => buf.push(2),
            }
            buf
        }
    }

    fn read_u64(input: &mut &[u8]) -> Result<u64, ProgramError> {
        if input.len() < 8 { return Err(ProgramError::InvalidInstructionData); }
        let (bytes, rest) = input.split_at(8);
        *input = rest;
        let bytes: [u8; 8] = bytes.try_into().map_err(|_| ProgramError::InvalidInstructionData)?;
        Ok(u64::from_le_bytes(bytes))
    }

    pub fn create_auction(
        program_id: &Pubkey,
        auction: &Pubkey,
        seller: &Pubkey,
        item_custody: &Pubkey,
        currency_custody: &Pubkey,
        start_price: u64,
    ) -> SolInstruction {
        SolInstruction {
            program_id: *program_id,
            accounts: vec![
                AccountMeta::new(*auction, false),
                AccountMeta::new_readonly(*seller, true),
                AccountMeta::new_readonly(*item_custody, false),
                AccountMeta::new_readonly(*currency_custody, false),
            ],
            data: Instruction::CreateAuction { start_price }.encode(),
        }
    }

    /// `ori_refund_receiver` is the record's current refund target, or
    /// `Pubkey::default()` before the first bid.
    #[allow(clippy::too_many_arguments)]
    pub fn bid(
        program_id: &Pubkey,
        auction: &Pubkey,
        bidder: &Pubkey,
        from: &Pubkey,
        currency_custody: &Pubkey,
        ori_refund_receiver: &Pubkey,
        seller: &Pubkey,
        amount: u64,
    ) -> SolInstruction {
        let (escrow, _) = crate::accounts::derive_escrow_authority(program_id, seller);
        SolInstruction {
            program_id: *program_id,
            accounts: vec![
                AccountMeta::new(*auction, false),
                AccountMeta::new_readonly(*bidder, true),
                AccountMeta::new(*from, false),
                AccountMeta::new(*currency_custody, false),
                AccountMeta::new(*ori_refund_receiver, false),
                AccountMeta::new_readonly(escrow, false),
                AccountMeta::new_readonly(spl_token::ID, false),
            ],
            data: Instruction::Bid { amount }.encode(),
        }
    }

    pub fn close_auction(
        program_id: &Pubkey,
        auction: &Pubkey,
        seller: &Pubkey,
        item_custody: &Pubkey,
        item_receiver: &Pubkey,
        currency_custody: &Pubkey,
        currency_receiver: &Pubkey,
    ) -> SolInstruction {
        let (escrow, _) = crate::accounts::derive_escrow_authority(program_id, seller);
        SolInstruction {
            program_id: *program_id,
            accounts: vec![
                AccountMeta::new(*auction, false),
                AccountMeta::new_readonly(*seller, true),
                AccountMeta::new(*item_custody, false),
                AccountMeta::new(*item_receiver, false),
                AccountMeta::new(*currency_custody, false),
                AccountMeta::new(*currency_receiver, false),
                AccountMeta::new_readonly(escrow, false),
                AccountMeta::new_readonly(spl_token::ID, false),
            ],
            data: Instruction::CloseAuction.encode(),
        }
    }
}

// 4. mod accounts
pub mod accounts {
    use solana_program::{account_info::AccountInfo, program_error::ProgramError, pubkey::Pubkey};
    use crate::error::AuctionError;

    pub fn expect_len(accounts: &[AccountInfo], n: usize) -> Result<(), ProgramError> {
        if accounts.len() < n {
            return Err(ProgramError::NotEnoughAccountKeys);
        }
        Ok(())
    }

    pub fn expect_signer(ai: &AccountInfo) -> Result<(), ProgramError> {
        if !ai.is_signer {
            return Err(AuctionError::ExpectedSigner.into());
        }
        Ok(())
    }

    pub fn expect_writable(ai: &AccountInfo) -> Result<(), ProgramError> {
        if !ai.is_writable {
            return Err(AuctionError::ExpectedWritable.into());
        }
        Ok(())
    }

    pub fn expect_owner(ai: &AccountInfo, owner: &Pubkey) -> Result<(), ProgramError> {
        if ai.owner != owner {
            return Err(ProgramError::IllegalOwner);
        }
        Ok(())
    }

    pub fn expect_token_program(ai: &AccountInfo) -> Result<(), ProgramError> {
        if ai.key != &spl_token::ID {
            return Err(ProgramError::IncorrectProgramId);
        }
        Ok(())
    }

    /// Keyless authority over every custody account of `seller`.
    /// Recomputed on each call; the bump is never trusted from storage.
    pub fn derive_escrow_authority(program_id: &Pubkey, seller: &Pubkey) -> (Pubkey, u8) {
        Pubkey::find_program_address(&[seller.as_ref()], program_id)
    }
}

// 5. mod state
pub mod state {
    use bytemuck::{Pod, Zeroable};
    use core::cell::RefMut;
    use solana_program::{account_info::AccountInfo, program_error::ProgramError, pubkey::Pubkey};
    use crate::constants::{MAGIC, RECORD_LEN, VERSION};
    use crate::error::AuctionError;

    /// On-chain layout of one auction. The no-bid state is encoded as
    /// `has_bid == 0`, `current_bidder == seller`, `refund_target == [0; 32]`.
    #[repr(C)]
    #[derive(Clone, Copy, Debug, Pod, Zeroable)]
    pub struct AuctionRecord {
        pub magic: u64,
        pub version: u32,
        pub ongoing: u8,
        pub has_bid: u8,
        pub _padding: [u8; 2],
        pub seller: [u8; 32],
        pub item_custody: [u8; 32],
        pub currency_custody: [u8; 32],
        pub current_bidder: [u8; 32],
        pub refund_target: [u8; 32],
        pub price: u64,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum HighBid {
        NoBid,
        HasBid { bidder: Pubkey, refund_target: Pubkey },
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Auction {
        pub seller: Pubkey,
        pub item_custody: Pubkey,
        pub currency_custody: Pubkey,
        pub price: u64,
        pub ongoing: bool,
        pub high_bid: HighBid,
    }

    impl Auction {
        pub fn new(seller: Pubkey, item_custody: Pubkey, currency_custody: Pubkey, start_price: u64) -> Self {
            Self {
                seller,
                item_custody,
                currency_custody,
                price: start_price,
                ongoing: true,
                high_bid: HighBid::NoBid,
            }
        }

        pub fn current_bidder(&self) -> Pubkey {
            match self.high_bid {
                HighBid::NoBid => self.seller,
                HighBid::HasBid { bidder, .. } => bidder,
            }
        }

        pub fn refund_target(&self) -> Pubkey {
            match self.high_bid {
                HighBid::NoBid => Pubkey::default(),
                HighBid::HasBid { refund_target, .. } => refund_target,
            }
        }

        pub fn to_record(&self) -> AuctionRecord {
            AuctionRecord {
                magic: MAGIC,
                version: VERSION,
                ongoing: self.ongoing as u8,
                has_bid: matches!(self.high_bid, HighBid::HasBid { .. }) as u8,
                _padding: [0; 2],
                seller: self.seller.to_bytes(),
                item_custody: self.item_custody.to_bytes(),
                currency_custody: self.currency_custody.to_bytes(),
                current_bidder: self.current_bidder().to_bytes(),
                refund_target: self.refund_target().to_bytes(),
                price: self.price,
            }
        }

        pub fn from_record(r: &AuctionRecord) -> Result<Self, ProgramError> {
            if r.magic != MAGIC { return Err(AuctionError::NotInitialized.into()); }
            if r.version != VERSION { return Err(ProgramError::InvalidAccountData); }

            let ongoing = flag(r.ongoing)?;
            let high_bid = if flag(r.has_bid)? {
                HighBid::HasBid {
                    bidder: Pubkey::new_from_array(r.current_bidder),
                    refund_target: Pubkey::new_from_array(r.refund_target),
                }
            } else {
                HighBid::NoBid
            };

            Ok(Self {
                seller: Pubkey::new_from_array(r.seller),
                item_custody: Pubkey::new_from_array(r.item_custody),
                currency_custody: Pubkey::new_from_array(r.currency_custody),
                price: r.price,
                ongoing,
                high_bid,
            })
        }
    }

    fn flag(b: u8) -> Result<bool, ProgramError> {
        match b {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ProgramError::InvalidAccountData),
        }
    }

    pub fn record_data_mut<'a, 'b>(ai: &'b AccountInfo<'a>) -> Result<RefMut<'b, &'a mut [u8]>, ProgramError> {
        Ok(ai.try_borrow_mut_data()?)
    }

    pub fn read_record(data: &[u8]) -> AuctionRecord {
        let mut r = AuctionRecord::zeroed();
        bytemuck::bytes_of_mut(&mut r).copy_from_slice(&data[..RECORD_LEN]);
        r
    }

    pub fn write_record(data: &mut [u8], r: &AuctionRecord) {
        data[..RECORD_LEN].copy_from_slice(bytemuck::bytes_of(r));
    }
}

// 6. mod custody
pub mod custody {
    use solana_program::{
        account_info::AccountInfo, program_error::ProgramError, program_pack::Pack,
    };
    use spl_token::state::Account as TokenAccount;

    #[cfg(not(test))]
    use solana_program::program::{invoke, invoke_signed};

    pub fn load(ai: &AccountInfo) -> Result<TokenAccount, ProgramError> {
        if ai.owner != &spl_token::ID || ai.data_len() != TokenAccount::LEN {
            return Err(ProgramError::InvalidAccountData);
        }
        let data = ai.try_borrow_data()?;
        TokenAccount::unpack(&data)
    }

    /// Moves `amount` into custody on the owner's own signature.
    pub fn collect<'a>(
        token_program: &AccountInfo<'a>,
        source: &AccountInfo<'a>,
        custody: &AccountInfo<'a>,
        owner: &AccountInfo<'a>,
        amount: u64,
    ) -> Result<(), ProgramError> {
        #[cfg(not(test))]
        {
            let ix = transfer_ix(token_program, source, custody, owner, amount)?;
            invoke(&ix, &[source.clone(), custody.clone(), owner.clone(), token_program.clone()])
        }
        #[cfg(test)]
        {
            let _ = token_program;
            move_balance(source, custody, owner, amount)
        }
    }

    /// Moves `amount` out of custody, signing as the escrow authority.
    pub fn release<'a>(
        token_program: &AccountInfo<'a>,
        custody: &AccountInfo<'a>,
        dest: &AccountInfo<'a>,
        escrow: &AccountInfo<'a>,
        amount: u64,
        signer_seeds: &[&[&[u8]]],
    ) -> Result<(), ProgramError> {
        #[cfg(not(test))]
        {
            let ix = transfer_ix(token_program, custody, dest, escrow, amount)?;
            invoke_signed(&ix, &[custody.clone(), dest.clone(), escrow.clone(), token_program.clone()], signer_seeds)
        }
        #[cfg(test)]
        {
            let _ = (token_program, signer_seeds);
            move_balance(custody, dest, escrow, amount)
        }
    }

    #[cfg(not(test))]
    fn transfer_ix(
        token_program: &AccountInfo,
        source: &AccountInfo,
        dest: &AccountInfo,
        authority: &AccountInfo,
        amount: u64,
    ) -> Result<solana_program::instruction::Instruction, ProgramError> {
        spl_token::instruction::transfer(token_program.key, source.key, dest.key, authority.key, &[], amount)
    }

    // Stands in for the token program in unit tests.
    #[cfg(test)]
    fn move_balance(source: &AccountInfo, dest: &AccountInfo, authority: &AccountInfo, amount: u64) -> Result<(), ProgramError> {
        use solana_program::program_option::COption;
        use spl_token::error::TokenError;

        let mut src_data = source.try_borrow_mut_data()?;
        let mut src_state = TokenAccount::unpack(&src_data)?;
        let mut dst_data = dest.try_borrow_mut_data()?;
        let mut dst_state = TokenAccount::unpack(&dst_data)?;

        if src_state.mint != dst_state.mint { return Err(TokenError::MintMismatch.into()); }
        if src_state.owner != *authority.key {
            if src_state.delegate != COption::Some(*authority.key) { return Err(TokenError::OwnerMismatch.into()); }
            src_state.delegated_amount = src_state.delegated_amount.checked_sub(amount).ok_or(TokenError::InsufficientFunds)?;
            if src_state.delegated_amount == 0 { src_state.delegate = COption::None; }
        }

        src_state.amount = src_state.amount.checked_sub(amount).ok_or(TokenError::InsufficientFunds)?;
        dst_state.amount = dst_state.amount.checked_add(amount).ok_or(TokenError::Overflow)?;
        TokenAccount::pack(src_state, &mut src_data)?;
        TokenAccount::pack(dst_state, &mut dst_data)?;
        Ok(())
    }
}

// 7. mod processor
pub mod processor {
    use solana_program::{
        account_info::AccountInfo, entrypoint::ProgramResult, msg, pubkey::Pubkey,
        program_error::ProgramError, program_option::COption,
    };
    use crate::{
        accounts,
        constants::{MAGIC, RECORD_LEN},
        custody,
        error::AuctionError,
        ix::Instruction,
        state::{self, Auction, HighBid},
    };

    fn record_guard(program_id: &Pubkey, auction: &AccountInfo, data: &[u8]) -> Result<(), ProgramError> {
        accounts::expect_owner(auction, program_id)?;
        if data.len() != RECORD_LEN { return Err(AuctionError::InvalidRecordLen.into()); }
        Ok(())
    }

    fn load_auction(program_id: &Pubkey, a_auction: &AccountInfo) -> Result<Auction, ProgramError> {
        let data = a_auction.try_borrow_data()?;
        record_guard(program_id, a_auction, &data)?;
        Auction::from_record(&state::read_record(&data))
    }

    fn store_auction(a_auction: &AccountInfo, auction: &Auction) -> Result<(), ProgramError> {
        let mut data = state::record_data_mut(a_auction)?;
        state::write_record(&mut data, &auction.to_record());
        Ok(())
    }

    /// Re-derives the escrow authority and requires both the supplied
    /// authority account and every custody's token owner to equal it.
    fn verify_escrow(
        program_id: &Pubkey,
        seller: &Pubkey,
        a_escrow: &AccountInfo,
        custodies: &[&AccountInfo],
    ) -> Result<u8, ProgramError> {
        let (escrow, bump) = accounts::derive_escrow_authority(program_id, seller);
        if *a_escrow.key != escrow { return Err(AuctionError::InvalidAuthority.into()); }
        for a_custody in custodies {
            let tok = custody::load(a_custody).map_err(|_| AuctionError::InvalidAuthority)?;
            if tok.owner != escrow { return Err(AuctionError::InvalidAuthority.into()); }
        }
        Ok(bump)
    }

    pub fn process_instruction<'a, 'b>(
        program_id: &Pubkey,
        accounts: &'b [AccountInfo<'a>],
        instruction_data: &[u8],
    ) -> ProgramResult {
        match Instruction::decode(instruction_data)? {
            Instruction::CreateAuction { start_price } => create_auction(program_id, accounts, start_price),
            Instruction::Bid { amount } => bid(program_id, accounts, amount),
            Instruction::CloseAuction => close_auction(program_id, accounts),
        }
    }

    fn create_auction(program_id: &Pubkey, accounts: &[AccountInfo], start_price: u64) -> ProgramResult {
        accounts::expect_len(accounts, 4)?;
        let a_auction = &accounts[0];
        let a_seller = &accounts[1];
        let a_item = &accounts[2];
        let a_currency = &accounts[3];

        accounts::expect_signer(a_seller)?;
        accounts::expect_writable(a_auction)?;

        let mut data = state::record_data_mut(a_auction)?;
        record_guard(program_id, a_auction, &data)?;

        if state::read_record(&data).magic == MAGIC {
            return Err(AuctionError::AlreadyInitialized.into());
        }

        let (escrow, _) = accounts::derive_escrow_authority(program_id, a_seller.key);

        let item = custody::load(a_item).map_err(|_| AuctionError::InvalidItemOwner)?;
        if item.owner != escrow { return Err(AuctionError::InvalidItemOwner.into()); }

        let currency = custody::load(a_currency).map_err(|_| AuctionError::InvalidCurrencyOwner)?;
        if currency.owner != escrow { return Err(AuctionError::InvalidCurrencyOwner.into()); }

        if a_item.key == a_currency.key || item.mint == currency.mint {
            return Err(AuctionError::InvalidCustodyAccount.into());
        }

        let auction = Auction::new(*a_seller.key, *a_item.key, *a_currency.key, start_price);
        state::write_record(&mut data, &auction.to_record());

        msg!("CreateAuction: seller={} start_price={}", a_seller.key, start_price);
        Ok(())
    }

    fn bid<'a>(program_id: &Pubkey, accounts: &[AccountInfo<'a>], amount: u64) -> ProgramResult {
        accounts::expect_len(accounts, 7)?;
        let a_auction = &accounts[0];
        let a_bidder = &accounts[1];
        let a_from = &accounts[2];
        let a_custody = &accounts[3];
        let a_refund = &accounts[4];
        let a_escrow = &accounts[5];
        let a_token = &accounts[6];

        accounts::expect_signer(a_bidder)?;
        accounts::expect_writable(a_auction)?;
        accounts::expect_writable(a_from)?;
        accounts::expect_writable(a_custody)?;
        accounts::expect_token_program(a_token)?;

        let mut auction = load_auction(program_id, a_auction)?;

        if !auction.ongoing { return Err(AuctionError::AuctionClosed.into()); }
        if amount <= auction.price { return Err(AuctionError::BidTooLow.into()); }
        if *a_refund.key != auction.refund_target() {
            return Err(AuctionError::RefundTargetMismatch.into());
        }
        if *a_custody.key != auction.currency_custody {
            return Err(AuctionError::InvalidCustodyAccount.into());
        }

        let bump = verify_escrow(program_id, &auction.seller, a_escrow, &[a_custody])?;

        let custody_state = custody::load(a_custody)?;
        let from = custody::load(a_from)?;
        if from.mint != custody_state.mint { return Err(AuctionError::MintMismatch.into()); }

        let previous = auction.price;

        // A leader raising from the refund target gets `previous` back first.
        let refund_in = match auction.high_bid {
            HighBid::HasBid { refund_target, .. } if refund_target == *a_from.key => previous,
            _ => 0,
        };
        let available = if from.owner == *a_bidder.key {
            from.amount.saturating_add(refund_in)
        } else if from.delegate == COption::Some(*a_bidder.key) {
            from.delegated_amount.min(from.amount.saturating_add(refund_in))
        } else {
            return Err(AuctionError::Unauthorized.into());
        };
        if available < amount { return Err(AuctionError::InsufficientFunds.into()); }

        if let HighBid::HasBid { .. } = auction.high_bid {
            accounts::expect_writable(a_refund)?;

            let bump_arr: [u8; 1] = [bump];
            let seeds: [&[u8]; 2] = [auction.seller.as_ref(), &bump_arr];
            let signer_seeds: [&[&[u8]]; 1] = [&seeds];

            custody::release(a_token, a_custody, a_refund, a_escrow, previous, &signer_seeds)?;
            msg!("Bid: refunded {} to {}", previous, a_refund.key);
        }

        custody::collect(a_token, a_from, a_custody, a_bidder, amount)?;

        auction.high_bid = HighBid::HasBid { bidder: *a_bidder.key, refund_target: *a_from.key };
        auction.price = amount;
        store_auction(a_auction, &auction)?;

        msg!("Bid: bidder={} price={} (was {})", a_bidder.key, amount, previous);
        Ok(())
    }

    fn close_auction<'a>(program_id: &Pubkey, accounts: &[AccountInfo<'a>]) -> ProgramResult {
        accounts::expect_len(accounts, 8)?;
        let a_auction = &accounts[0];
        let a_seller = &accounts[1];
        let a_item = &accounts[2];
        let a_item_receiver = &accounts[3];
        let a_currency = &accounts[4];
        let a_currency_receiver = &accounts[5];
        let a_escrow = &accounts[6];
        let a_token = &accounts[7];

        accounts::expect_signer(a_seller)?;
        accounts::expect_writable(a_auction)?;
        accounts::expect_writable(a_item)?;
        accounts::expect_writable(a_item_receiver)?;
        accounts::expect_writable(a_currency)?;
        accounts::expect_writable(a_currency_receiver)?;
        accounts::expect_token_program(a_token)?;

        let mut auction = load_auction(program_id, a_auction)?;

        if !auction.ongoing { return Err(AuctionError::AuctionClosed.into()); }
        if *a_seller.key != auction.seller { return Err(AuctionError::Unauthorized.into()); }
        if *a_item.key != auction.item_custody || *a_currency.key != auction.currency_custody {
            return Err(AuctionError::InvalidCustodyAccount.into());
        }

        let bump = verify_escrow(program_id, &auction.seller, a_escrow, &[a_item, a_currency])?;

        let item = custody::load(a_item)?;
        let currency = custody::load(a_currency)?;
        let item_receiver = custody::load(a_item_receiver)?;
        let currency_receiver = custody::load(a_currency_receiver)?;
        if item_receiver.mint != item.mint || currency_receiver.mint != currency.mint {
            return Err(AuctionError::MintMismatch.into());
        }

        // Winner takes the item; the seller takes the proceeds, if any.
        match auction.high_bid {
            HighBid::NoBid => {
                if item_receiver.owner != auction.seller {
                    return Err(AuctionError::InvalidReceiver.into());
                }
            }
            HighBid::HasBid { bidder, .. } => {
                if item_receiver.owner != bidder || currency_receiver.owner != auction.seller {
                    return Err(AuctionError::InvalidReceiver.into());
                }
            }
        }

        let bump_arr: [u8; 1] = [bump];
        let seeds: [&[u8]; 2] = [auction.seller.as_ref(), &bump_arr];
        let signer_seeds: [&[&[u8]]; 1] = [&seeds];

        if item.amount > 0 {
            custody::release(a_token, a_item, a_item_receiver, a_escrow, item.amount, &signer_seeds)?;
        }
        if currency.amount > 0 {
            custody::release(a_token, a_currency, a_currency_receiver, a_escrow, currency.amount, &signer_seeds)?;
        }

        auction.ongoing = false;
        store_auction(a_auction, &auction)?;

        msg!("CloseAuction: winner={} price={} item={}", auction.current_bidder(), auction.price, item.amount);
        Ok(())
    }
}

// 8. mod entrypoint
#[cfg(not(feature = "no-entrypoint"))]
pub mod entrypoint {
    use solana_program::{
        account_info::AccountInfo, entrypoint, entrypoint::ProgramResult,
        program_error::PrintProgramError, pubkey::Pubkey,
    };
    use crate::{error::AuctionError, processor};

    entrypoint!(process_instruction);

    fn process_instruction<'a>(
        program_id: &Pubkey,
        accounts: &'a [AccountInfo<'a>],
        instruction_data: &[u8],
    ) -> ProgramResult {
        if let Err(error) = processor::process_instruction(program_id, accounts, instruction_data) {
            error.print::<AuctionError>();
            return Err(error);
        }
        Ok(())
    }
}
