//! Centralized Contract Definitions
//!
//! Solidity interfaces for the Hyperdrive pool, its base token and yield
//! source, defined with alloy's `sol!` macro.
//!
//! Each interface is annotated with `#[sol(rpc)]` to generate contract
//! instance types that can make RPC calls via any alloy Provider. Events
//! and custom errors are declared on `IHyperdrive` so receipts and revert
//! data can be decoded through the generated `IHyperdriveEvents` and
//! `IHyperdriveErrors` enums.

use alloy::sol;

// ── Hyperdrive ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    #[derive(Debug, PartialEq)]
    interface IHyperdrive {
        struct Options {
            address destination;
            bool asBase;
            bytes extraData;
        }

        struct Fees {
            uint256 curve;
            uint256 flat;
            uint256 governance;
        }

        struct PoolConfig {
            address baseToken;
            uint256 initialSharePrice;
            uint256 minimumShareReserves;
            uint256 minimumTransactionAmount;
            uint256 positionDuration;
            uint256 checkpointDuration;
            uint256 timeStretch;
            address governance;
            address feeCollector;
            Fees fees;
            uint256 oracleSize;
            uint256 updateGap;
        }

        struct PoolInfo {
            uint256 shareReserves;
            int256 shareAdjustment;
            uint256 bondReserves;
            uint256 lpTotalSupply;
            uint256 sharePrice;
            uint256 longsOutstanding;
            uint256 longAverageMaturityTime;
            uint256 shortsOutstanding;
            uint256 shortAverageMaturityTime;
            uint256 withdrawalSharesReadyToWithdraw;
            uint256 withdrawalSharesProceeds;
            uint256 lpSharePrice;
            uint256 longExposure;
        }

        struct Checkpoint {
            uint128 sharePrice;
            int128 longExposure;
        }

        // Trades
        function initialize(uint256 _contribution, uint256 _apr, Options calldata _options) external payable returns (uint256 lpShares);
        function openLong(uint256 _baseAmount, uint256 _minOutput, uint256 _minSharePrice, Options calldata _options) external payable returns (uint256 maturityTime, uint256 bondProceeds);
        function closeLong(uint256 _maturityTime, uint256 _bondAmount, uint256 _minOutput, Options calldata _options) external returns (uint256 proceeds);
        function openShort(uint256 _bondAmount, uint256 _maxDeposit, uint256 _minSharePrice, Options calldata _options) external payable returns (uint256 maturityTime, uint256 traderDeposit);
        function closeShort(uint256 _maturityTime, uint256 _bondAmount, uint256 _minOutput, Options calldata _options) external returns (uint256 proceeds);
        function addLiquidity(uint256 _contribution, uint256 _minApr, uint256 _maxApr, Options calldata _options) external payable returns (uint256 lpShares);
        function removeLiquidity(uint256 _shares, uint256 _minOutput, Options calldata _options) external returns (uint256 baseProceeds, uint256 withdrawalShares);
        function redeemWithdrawalShares(uint256 _shares, uint256 _minOutput, Options calldata _options) external returns (uint256 proceeds, uint256 sharesRedeemed);
        function checkpoint(uint256 _checkpointTime) external;

        // Views
        function baseToken() external view returns (address);
        function balanceOf(uint256 tokenId, address owner) external view returns (uint256);
        function getCheckpoint(uint256 _checkpointId) external view returns (Checkpoint memory);
        function getPoolConfig() external view returns (PoolConfig memory);
        function getPoolInfo() external view returns (PoolInfo memory);

        // Events
        event Initialize(address indexed provider, uint256 lpAmount, uint256 baseAmount, uint256 sharePrice, uint256 apr);
        event AddLiquidity(address indexed provider, uint256 lpAmount, uint256 baseAmount, uint256 sharePrice, uint256 lpSharePrice);
        event RemoveLiquidity(address indexed provider, uint256 lpAmount, uint256 baseAmount, uint256 sharePrice, uint256 withdrawalShareAmount, uint256 lpSharePrice);
        event RedeemWithdrawalShares(address indexed provider, uint256 withdrawalShareAmount, uint256 baseAmount, uint256 sharePrice);
        event OpenLong(address indexed trader, uint256 indexed assetId, uint256 maturityTime, uint256 baseAmount, uint256 sharePrice, uint256 bondAmount);
        event OpenShort(address indexed trader, uint256 indexed assetId, uint256 maturityTime, uint256 baseAmount, uint256 sharePrice, uint256 bondAmount);
        event CloseLong(address indexed trader, uint256 indexed assetId, uint256 maturityTime, uint256 baseAmount, uint256 sharePrice, uint256 bondAmount);
        event CloseShort(address indexed trader, uint256 indexed assetId, uint256 maturityTime, uint256 baseAmount, uint256 sharePrice, uint256 bondAmount);
        event CreateCheckpoint(uint256 indexed checkpointTime, uint256 sharePrice, uint256 maturedShorts, uint256 maturedLongs, uint256 lpSharePrice);
        event TransferSingle(address indexed operator, address indexed from, address indexed to, uint256 id, uint256 value);

        // Errors surfaced as slippage
        error OutputLimit();
        error MinimumSharePrice();
        error MinimumTransactionAmount();
        error InsufficientLiquidity();
    }
}

// ── Base token ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
}

/// Test-chain base token with an open mint, used to fund agents on anvil.
sol! {
    #[sol(rpc)]
    interface IERC20Mintable {
        function mint(address destination, uint256 amount) external;
    }
}

// ── Yield source ─────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IYieldSource {
        function getRate() external view returns (uint256);
    }
}
